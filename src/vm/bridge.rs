//! VM桥接层：连接UI与会话控制器的状态文案
//!
//! 注意：具体的UI绑定在核心之外实现，这里只提供公共常量

// === 常量定义（消除魔法值） ===
pub const STATUS_READY: &str = "就绪";
pub const STATUS_FORMATTED: &str = "格式化完成";
pub const STATUS_MINIFIED: &str = "压缩完成";
pub const STATUS_RECOVERED: &str = "已自动恢复转义并重新解析";
pub const STATUS_COPIED: &str = "已复制到剪贴板";
pub const STATUS_ERROR_PREFIX: &str = "错误: ";
