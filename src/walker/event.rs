//! 事件指令列表
//!
//! 地图事件页、公共事件与敌群事件页的 `@list` 都是 `RPG::EventCommand`
//! 数组。每条指令按 `@code` 决定哪些参数可翻译，组名为
//! `Command: <指令名>`。

use crate::marshal::{Document, Node, NodeId};
use super::{non_empty_string, Site};

/// 显示文章
const SHOW_TEXT: i64 = 101;
/// 显示文章的续行
const TEXT_LINE: i64 = 401;
const CHOICES: i64 = 102;
const COMMENT: i64 = 108;
const COMMENT_LINE: i64 = 408;
const SCRIPT: i64 = 355;
const SCRIPT_LINE: i64 = 655;

/// 指令编号对应的名称
pub fn command_name(code: i64) -> Option<&'static str> {
    let name = match code {
        101 => "Show Text",
        102 => "Choices",
        103 => "Number Input",
        104 => "Select Item",
        105 => "Key Input",
        106 => "Wait",
        108 => "Comment",
        111 => "If ...",
        112 => "Loop ...",
        113 => "Loop Break",
        115 => "Exit Event",
        116 => "Erase Event",
        117 => "Common Event",
        118 => "Label",
        119 => "Jump to Label",
        121 => "Switch Control",
        122 => "Variable Control",
        123 => "Self Switch Control",
        124 => "Timer Control",
        125 => "Gold Change",
        126 => "Item Change",
        127 => "Weapon Change",
        128 => "Armor Change",
        129 => "Party Change",
        131 => "Window Skin Change",
        132 => "Battle BGM Change",
        133 => "Victory ME Change",
        134 => "Save Access Change",
        135 => "Menu Access Change",
        136 => "Encounter Change",
        201 => "Transfer Player",
        202 => "Move Event",
        203 => "Scroll Map",
        204 => "Map Settings",
        205 => "Fog Color Tone Change",
        206 => "Fog Opacity Change",
        207 => "Show Animation",
        208 => "Transparency Flag",
        209 => "Movement Route",
        210 => "Wait for Movevement",
        221 => "Prepare Transition",
        222 => "Execute Transition",
        223 => "Tint Screen",
        224 => "Flash Screen",
        225 => "Shake Screen",
        231 => "Show Picture",
        232 => "Move Picture",
        233 => "Rotate Picture",
        234 => "Tint Picture",
        235 => "Erase Picture",
        236 => "Set Weather",
        241 => "Play BGM",
        242 => "Fadeout BGM",
        245 => "Play BGS",
        246 => "Fadeout BGS",
        247 => "Memorize BGM/BGS",
        248 => "Restore BGM/BGS",
        249 => "Play ME",
        250 => "Play SE",
        251 => "Stop SE",
        301 => "Battle Processing",
        302 => "Shop Processing",
        303 => "Name Input Processing",
        311 => "HP Change",
        312 => "MP Change",
        313 => "State Change",
        314 => "Recover All",
        315 => "EXP Change",
        316 => "LVL Change",
        317 => "Parameter Change",
        318 => "Skill Change",
        319 => "Equipment Change",
        320 => "Name Change",
        321 => "Class Change",
        322 => "Actor Image Change",
        331 => "Enemy HP Change",
        332 => "Enemy MP Change",
        333 => "Enemy State Change",
        334 => "Enemy Recover All",
        335 => "Enemy Appear",
        336 => "Enemy Transform",
        337 => "Show Battle Animation",
        338 => "Deal Damage",
        339 => "Force Action",
        340 => "Abort Battle",
        351 => "Open Menu Screen",
        352 => "Open Save Screen",
        353 => "Game Over",
        354 => "Return to Title Screen",
        355 => "Script",
        401 => "Text Line",
        402 => "When ...",
        403 => "When Cancel",
        404 => "Choices End",
        408 => "Comment Line",
        411 => "Else ...",
        412 => "Branch End",
        413 => "Repeat above...",
        509 => "Move Command",
        601 => "If Battle Win",
        602 => "If Battle Escape",
        603 => "If Battle Lose",
        604 => "Battle Processing End",
        605 => "Shop Item",
        655 => "Script Line",
        _ => return None,
    };
    Some(name)
}

/// 指令组名，未知编号为 `Command: Code n`
pub fn command_group(code: i64) -> String {
    match command_name(code) {
        Some(name) => format!("Command: {}", name),
        None => format!("Command: Code {}", code),
    }
}

/// 对象的 `@code`；不是带编号的对象时为 `None`
fn command_code(doc: &Document, item: NodeId) -> Option<i64> {
    if !matches!(doc.node(item), Node::Object { .. }) {
        return None;
    }
    doc.field(item, b"@code").and_then(|code| doc.fixnum(code))
}

fn is_event_command(doc: &Document, item: NodeId) -> bool {
    doc.class_name(item) == Some(b"RPG::EventCommand")
}

fn push_text(doc: &Document, id: NodeId, group: &str, sites: &mut Vec<Site>) {
    if non_empty_string(doc, id) {
        sites.push(Site::Text {
            group: group.to_string(),
            node: id,
            compressed: false,
        });
    }
}

/// 首个参数（多行指令的文本）
fn first_parameter(doc: &Document, command: NodeId) -> Option<NodeId> {
    let parameters = doc.field(command, b"@parameters")?;
    doc.array_items(parameters)?.first().copied()
}

/// 收集一个事件指令列表中的字符串位置
///
/// # 参数
/// * `list` - `@list` 数组节点；不是数组时不产生任何位置
pub fn collect_event_list(doc: &Document, list: NodeId, sites: &mut Vec<Site>) {
    let Some(commands) = doc.array_items(list) else {
        return;
    };

    let mut i = 0;
    while i < commands.len() {
        let command = commands[i];
        i += 1;
        if !is_event_command(doc, command) {
            continue;
        }
        let Some(code) = command_code(doc, command) else {
            continue;
        };
        let Some(parameters) = doc
            .field(command, b"@parameters")
            .and_then(|parameters| doc.array_items(parameters))
        else {
            continue;
        };
        let group = command_group(code);

        match code {
            SHOW_TEXT | SCRIPT => {
                let continuation = if code == SHOW_TEXT { TEXT_LINE } else { SCRIPT_LINE };
                if let Some(first) = parameters.first() {
                    push_text(doc, *first, &group, sites);
                }
                // 续行一直延续到下一条编号不同的指令，中间的非对象元素跳过
                while i < commands.len() {
                    let next = commands[i];
                    if matches!(doc.node(next), Node::Object { .. }) {
                        if command_code(doc, next) != Some(continuation) {
                            break;
                        }
                        if let Some(line) = first_parameter(doc, next) {
                            push_text(doc, line, &group, sites);
                        }
                    }
                    i += 1;
                }
            }
            CHOICES => {
                for parameter in parameters {
                    match doc.array_items(*parameter) {
                        Some(choices) => {
                            for choice in choices {
                                push_text(doc, *choice, &group, sites);
                            }
                        }
                        None => push_text(doc, *parameter, &group, sites),
                    }
                }
            }
            COMMENT | COMMENT_LINE => {}
            _ => {
                for parameter in parameters {
                    push_text(doc, *parameter, &group, sites);
                }
            }
        }
    }
}

/// 事件页数组：每页的 `@list` 有字符串时前置 `Page n` 分隔组
pub fn collect_pages(doc: &Document, pages: NodeId, sites: &mut Vec<Site>) {
    let Some(pages) = doc.array_items(pages) else {
        return;
    };
    for (index, page) in pages.iter().enumerate() {
        let Some(list) = doc.field(*page, b"@list") else {
            continue;
        };
        let mut inner = Vec::new();
        collect_event_list(doc, list, &mut inner);
        if !inner.is_empty() {
            sites.push(Site::Header(format!("Page {}", index + 1)));
            sites.extend(inner);
        }
    }
}
