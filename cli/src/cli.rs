use clap::{ArgAction, Args, Parser, Subcommand};
use idcheck_ocr::{EngineKind, VariantKind};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "idcheck", version, about = "身份证号码识别与校验")]
pub struct Cli {
    #[arg(long, global = true, help = "配置文件路径（默认位于用户配置目录）")]
    pub config: Option<PathBuf>,
    #[arg(long, global = true, help = "输出 JSON")]
    pub json: bool,
    #[arg(short, long, global = true, action = ArgAction::Count, help = "日志详细程度（-v debug，-vv trace）")]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 识别并校验图片中的身份证号码
    Verify(VerifyArgs),
    /// 直接校验号码，不做识别
    Check {
        #[arg(required = true)]
        numbers: Vec<String>,
    },
    /// 从文本中提取候选号码
    Extract {
        text: Option<String>,
        #[arg(long, conflicts_with = "text")]
        file: Option<PathBuf>,
    },
    /// 列出 OCR 引擎状态
    Engines,
}

#[derive(Args, Debug, Clone, Default)]
pub struct VerifyArgs {
    #[arg(required = true)]
    pub images: Vec<PathBuf>,
    #[arg(long, help = "把结果追加到 CSV 结果文件")]
    pub save: bool,
    #[arg(long, help = "CSV 结果文件路径")]
    pub results: Option<PathBuf>,
    #[arg(long = "variant", help = "只使用指定的预处理方式（可重复，按给出顺序）")]
    pub variants: Vec<VariantKind>,
    #[arg(long = "engine", help = "只使用指定的引擎（可重复，按给出顺序）")]
    pub engines: Vec<EngineKind>,
    #[arg(long, help = "找到通过校验的号码才停止搜索")]
    pub stop_on_valid: bool,
}
