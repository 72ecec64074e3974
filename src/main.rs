use anyhow::{bail, Context};
use clap::{ArgGroup, Parser};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use rgss_localizer::editor::{extract_files, file_key, patch_files, PatchJob};
use rgss_localizer::io::{DefaultMarshalReader, DefaultMarshalWriter, MarshalReader};
use rgss_localizer::string_types::count_strings;
use rgss_localizer::{create_backup, Document, MarshalFileKind, StringCatalog, SUPPORTED_EXTENSIONS};

#[derive(Parser)]
#[command(name = "rgss_localizer")]
#[command(about = "提取并写回 RPG Maker XP/VX/VX Ace 数据文件中的可翻译字符串")]
#[command(version)]
#[command(group(ArgGroup::new("mode").args(["build_catalog", "apply", "test_rebuild", "dump"])))]
struct Cli {
    /// 输入数据文件或目录（.rxdata/.rvdata/.rvdata2）
    #[arg(short, long)]
    input: PathBuf,

    /// 输出路径（文件或目录，视模式而定）
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// 字符串目录 JSON 路径（默认为输入旁的 strings.json）
    #[arg(short, long)]
    catalog: Option<PathBuf>,

    /// 提取模式：扫描输入并更新字符串目录（未指定模式时的默认值）
    #[arg(long)]
    build_catalog: bool,

    /// 写回模式：按字符串目录把译文写回数据文件
    #[arg(long)]
    apply: bool,

    /// 测试模式：解码后直接重新编码，检查是否逐字节一致
    #[arg(long)]
    test_rebuild: bool,

    /// 导出对象图的调试 JSON
    #[arg(long)]
    dump: bool,

    /// 静默模式(仅输出错误)
    #[arg(long)]
    quiet: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.quiet);

    validate_input(&cli.input)?;
    let files = collect_input_files(&cli.input)?;
    if files.is_empty() {
        bail!("输入中没有找到数据文件: {:?}", cli.input);
    }

    match cli.mode() {
        Mode::BuildCatalog => handle_build_catalog(&cli, &files),
        Mode::Apply => handle_apply(&cli, &files),
        Mode::TestRebuild => handle_test_rebuild(&cli, &files),
        Mode::Dump => handle_dump(&cli, &files),
    }
}

/// 运行模式，四个开关互斥
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    BuildCatalog,
    Apply,
    TestRebuild,
    Dump,
}

impl Cli {
    fn mode(&self) -> Mode {
        if self.build_catalog {
            Mode::BuildCatalog
        } else if self.apply {
            Mode::Apply
        } else if self.test_rebuild {
            Mode::TestRebuild
        } else if self.dump {
            Mode::Dump
        } else {
            Mode::BuildCatalog
        }
    }
}

/// 初始化日志：`RUST_LOG` 优先，否则默认 info（静默模式为 error）
fn init_logging(quiet: bool) {
    let default_level = if quiet { "error" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// 验证输入路径
fn validate_input(input: &Path) -> anyhow::Result<()> {
    if !input.exists() {
        bail!("输入路径不存在: {:?}", input);
    }
    if input.is_file() && !is_supported(input) {
        bail!("输入文件必须是 rxdata、rvdata 或 rvdata2 文件");
    }
    Ok(())
}

fn is_supported(path: &Path) -> bool {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase());
    SUPPORTED_EXTENSIONS.iter().any(|&ext| Some(ext) == extension.as_deref())
}

/// 收集输入文件（目录会递归扫描），按路径排序
fn collect_input_files(input: &Path) -> anyhow::Result<Vec<PathBuf>> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }

    let mut files = Vec::new();
    let mut pending = vec![input.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir).with_context(|| format!("读取目录失败: {:?}", dir))? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if is_supported(&path) {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

/// 字符串目录路径
fn catalog_path(cli: &Cli) -> PathBuf {
    cli.catalog.clone().unwrap_or_else(|| {
        let base = if cli.input.is_dir() {
            cli.input.clone()
        } else {
            cli.input.parent().map(Path::to_path_buf).unwrap_or_default()
        };
        base.join("strings.json")
    })
}

/// 写回时的输出路径：指定输出目录时保持相对于输入的结构，否则原地覆盖
fn output_path(cli: &Cli, file: &Path) -> PathBuf {
    match &cli.output {
        Some(output) if cli.input.is_file() => output.clone(),
        Some(output) => match file.strip_prefix(&cli.input) {
            Ok(relative) => output.join(relative),
            Err(_) => output.join(file.file_name().unwrap_or_default()),
        },
        None => file.to_path_buf(),
    }
}

/// 处理提取模式
fn handle_build_catalog(cli: &Cli, files: &[PathBuf]) -> anyhow::Result<()> {
    let path = catalog_path(cli);
    let mut catalog = if path.exists() {
        StringCatalog::load(&path).with_context(|| format!("读取字符串目录失败: {:?}", path))?
    } else {
        StringCatalog::new()
    };

    let keyed: Vec<(String, PathBuf)> = files.iter().map(|f| (file_key(f), f.clone())).collect();
    let reports = extract_files(&keyed, &DefaultMarshalReader);

    let mut failed = 0;
    let mut total = 0;
    for report in reports {
        match report.result {
            Ok(groups) => {
                total += count_strings(&groups);
                catalog.register_file(&report.file_key, groups);
            }
            Err(_) => failed += 1,
        }
    }

    catalog.save(&path).with_context(|| format!("写入字符串目录失败: {:?}", path))?;

    if !cli.quiet {
        println!("扫描 {} 个文件，失败 {} 个", files.len(), failed);
        println!("提取到 {} 处字符串，去重后 {} 条", total, catalog.strings.len());
        println!("字符串目录已写入: {:?}", path);
    }
    Ok(())
}

/// 处理写回模式
fn handle_apply(cli: &Cli, files: &[PathBuf]) -> anyhow::Result<()> {
    let path = catalog_path(cli);
    let catalog = StringCatalog::load(&path).with_context(|| format!("读取字符串目录失败: {:?}", path))?;

    let jobs: Vec<PatchJob> = files
        .iter()
        .map(|f| PatchJob {
            file_key: file_key(f),
            input: f.clone(),
            output: output_path(cli, f),
        })
        .collect();

    // 原地覆盖前先备份
    if cli.output.is_none() {
        for job in &jobs {
            let backup = create_backup(&job.input)?;
            tracing::debug!(backup = ?backup, "已创建备份");
        }
    }

    let reports = patch_files(&jobs, &catalog, &DefaultMarshalReader, &DefaultMarshalWriter);
    let modified = reports.iter().filter(|r| matches!(r.result, Ok(true))).count();
    let failed = reports.iter().filter(|r| !r.is_ok()).count();

    if !cli.quiet {
        println!("处理 {} 个文件：修改 {} 个，失败 {} 个", reports.len(), modified, failed);
        for report in reports.iter().filter(|r| !r.is_ok()) {
            if let Err(e) = &report.result {
                println!("  {}: {}", report.file_key, e);
            }
        }
    }

    if failed > 0 {
        bail!("{} 个文件写回失败", failed);
    }
    Ok(())
}

/// 处理测试重建模式
fn handle_test_rebuild(cli: &Cli, files: &[PathBuf]) -> anyhow::Result<()> {
    let reader = DefaultMarshalReader;
    let mut mismatched = 0;

    for file in files {
        let data = reader.read(file)?;
        let rebuilt = Document::decode(&data.bytes)
            .and_then(|doc| doc.encode())
            .with_context(|| format!("重建失败: {:?}", file))?;

        if rebuilt[..] == data.bytes[..] {
            if !cli.quiet {
                println!("✓ {:?} ({} 字节)", file, data.bytes.len());
            }
        } else {
            mismatched += 1;
            let first_diff = rebuilt
                .iter()
                .zip(data.bytes.iter())
                .position(|(a, b)| a != b)
                .unwrap_or_else(|| rebuilt.len().min(data.bytes.len()));
            println!(
                "⚠ {:?} 重建结果不一致：原文件 {} 字节，重建 {} 字节，首个差异位于 {}",
                file,
                data.bytes.len(),
                rebuilt.len(),
                first_diff
            );
        }

        if let Some(output) = &cli.output {
            let target = output_path(cli, file);
            if target != *file {
                std::fs::create_dir_all(target.parent().unwrap_or(output))?;
                std::fs::write(&target, &rebuilt)?;
            }
        }
    }

    if mismatched > 0 {
        bail!("{} 个文件重建结果不一致", mismatched);
    }
    Ok(())
}

/// 导出调试 JSON
fn handle_dump(cli: &Cli, files: &[PathBuf]) -> anyhow::Result<()> {
    let reader = DefaultMarshalReader;
    for file in files {
        let data = reader.read(file)?;
        let doc = Document::decode(&data.bytes).with_context(|| format!("解析失败: {:?}", file))?;
        let is_script = MarshalFileKind::from_path(&file_key(file)) == MarshalFileKind::Scripts;
        let json = serde_json::to_string_pretty(&doc.to_debug_json(is_script))?;

        let target = match &cli.output {
            Some(_) => output_path(cli, file).with_extension("json"),
            None => file.with_extension("json"),
        };
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&target, json)?;

        if !cli.quiet {
            println!("{:?} -> {:?}", file, target);
        }
    }
    Ok(())
}
