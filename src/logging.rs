use log::{warn, LevelFilter};
use log4rs::{
    append::console::{ConsoleAppender, Target},
    config::{Appender, Config, Root},
    encode::pattern::PatternEncoder,
};

const FALLBACK_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S)} [{l}] {m}{n}";

/// 从 YAML 文件初始化 log4rs；文件缺失或无效时退回到控制台输出。
///
/// 服务端的日志写到标准输出，客户端写到标准错误，避免和报告混在一起。
pub fn init(path: &str, target: Target, level: LevelFilter) {
    let err = match log4rs::init_file(path, Default::default()) {
        Ok(()) => return,
        Err(e) => e,
    };
    let console = ConsoleAppender::builder()
        .target(target)
        .encoder(Box::new(PatternEncoder::new(FALLBACK_PATTERN)))
        .build();
    let config = Config::builder()
        .appender(Appender::builder().build("console", Box::new(console)))
        .build(Root::builder().appender("console").build(level));
    match config {
        Ok(c) => {
            if log4rs::init_config(c).is_ok() {
                warn!("无法从{}载入日志配置（{}），改用控制台输出", path, err);
            }
        }
        Err(e) => eprintln!("日志系统初始化失败：{}", e),
    }
}
