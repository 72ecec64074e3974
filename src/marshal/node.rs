//! Marshal 节点模型
//!
//! 所有节点由所属 [`Document`](super::Document) 的 arena 持有，子节点通过
//! [`NodeId`] 引用；反向引用（`Link`/`SymbolLink`）保存的是引用表下标，
//! 因此循环或共享的对象图不会产生所有权问题。

/// 标记字节
pub mod token {
    pub const NIL: u8 = b'0';
    pub const TRUE: u8 = b'T';
    pub const FALSE: u8 = b'F';
    pub const IVAR: u8 = b'I';
    pub const STRING: u8 = b'"';
    pub const SYMBOL: u8 = b':';
    pub const SYMLINK: u8 = b';';
    pub const FIXNUM: u8 = b'i';
    pub const ARRAY: u8 = b'[';
    pub const HASH: u8 = b'{';
    pub const FLOAT: u8 = b'f';
    pub const BIGNUM: u8 = b'l';
    pub const REGEX: u8 = b'/';
    pub const USER_MARSHAL: u8 = b'U';
    pub const OBJECT: u8 = b'o';
    pub const LINK: u8 = b'@';
    pub const USER_DEFINED: u8 = b'u';
    pub const MODULE_OLD: u8 = b'm';
    pub const CLASS: u8 = b'c';
    pub const MODULE: u8 = b'M';

    /// 解码该标记前是否要在对象表中预留槽位
    ///
    /// 除 nil/true/false/fixnum/symbol/symlink/link 外都要预留。
    pub fn reserves_object_slot(token: u8) -> bool {
        !matches!(token, NIL | TRUE | FALSE | FIXNUM | SYMBOL | SYMLINK | LINK)
    }
}

/// 字符串末尾的额外标记字节（部分文件版本中出现）
pub const TRAILING_MARKER: u8 = 0x06;

/// arena 内的节点标识符
///
/// 只能由解码器分配，外部代码不能凭空构造。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// `c` / `M` / `m` 三种类或模块引用
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassRefKind {
    Class,
    Module,
    /// 旧版 `m` 标记（类或模块）
    ClassOrModule,
}

impl ClassRefKind {
    pub fn token(self) -> u8 {
        match self {
            ClassRefKind::Class => token::CLASS,
            ClassRefKind::Module => token::MODULE,
            ClassRefKind::ClassOrModule => token::MODULE_OLD,
        }
    }

    pub fn from_token(token: u8) -> Option<Self> {
        match token {
            token::CLASS => Some(ClassRefKind::Class),
            token::MODULE => Some(ClassRefKind::Module),
            token::MODULE_OLD => Some(ClassRefKind::ClassOrModule),
            _ => None,
        }
    }
}

/// Marshal 节点
///
/// 浮点数、大整数和正则只保存原始字节，本地化只关心字符串内容。
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Nil,
    True,
    False,
    /// `I`：被包装的值及其实例变量表（通常是字符串的 `:E => true`）
    InstanceVar {
        value: NodeId,
        ivars: Vec<(NodeId, NodeId)>,
    },
    /// `"`：原始字节，`trailing_marker` 记录其后是否跟随 0x06
    String {
        bytes: Vec<u8>,
        trailing_marker: bool,
    },
    Symbol(Vec<u8>),
    /// 符号表下标
    SymbolLink(usize),
    Fixnum(i64),
    Array(Vec<NodeId>),
    Hash(Vec<(NodeId, NodeId)>),
    Float(Vec<u8>),
    Bignum {
        sign: u8,
        words: Vec<u8>,
    },
    Regex {
        source: Vec<u8>,
        options: u8,
    },
    UserMarshal {
        class_name: NodeId,
        data: NodeId,
    },
    Object {
        class_name: NodeId,
        fields: Vec<(NodeId, NodeId)>,
    },
    /// 对象表下标
    Link(usize),
    UserDefined {
        class_name: NodeId,
        data: Vec<u8>,
    },
    ClassRef {
        kind: ClassRefKind,
        name: Vec<u8>,
    },
}

impl Node {
    /// 节点对应的标记字节
    pub fn token(&self) -> u8 {
        match self {
            Node::Nil => token::NIL,
            Node::True => token::TRUE,
            Node::False => token::FALSE,
            Node::InstanceVar { .. } => token::IVAR,
            Node::String { .. } => token::STRING,
            Node::Symbol(_) => token::SYMBOL,
            Node::SymbolLink(_) => token::SYMLINK,
            Node::Fixnum(_) => token::FIXNUM,
            Node::Array(_) => token::ARRAY,
            Node::Hash(_) => token::HASH,
            Node::Float(_) => token::FLOAT,
            Node::Bignum { .. } => token::BIGNUM,
            Node::Regex { .. } => token::REGEX,
            Node::UserMarshal { .. } => token::USER_MARSHAL,
            Node::Object { .. } => token::OBJECT,
            Node::Link(_) => token::LINK,
            Node::UserDefined { .. } => token::USER_DEFINED,
            Node::ClassRef { kind, .. } => kind.token(),
        }
    }

    /// 是否占用对象表槽位
    pub fn reserves_object_slot(&self) -> bool {
        token::reserves_object_slot(self.token())
    }

    /// 键值对（仅 Hash 与 Object）
    pub fn pairs(&self) -> Option<&[(NodeId, NodeId)]> {
        match self {
            Node::Hash(pairs) => Some(pairs),
            Node::Object { fields, .. } => Some(fields),
            _ => None,
        }
    }

    /// 可作为名称比较的字节（字符串与符号）
    pub fn name_bytes(&self) -> Option<&[u8]> {
        match self {
            Node::String { bytes, .. } => Some(bytes),
            Node::Symbol(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Node::String { .. })
    }
}
