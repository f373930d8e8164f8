//! OCR 错误类型

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("无法执行 {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("OCR 引擎执行失败: {0}")]
    Failed(String),

    #[error("OCR 超时（{0} 秒）")]
    Timeout(u64),

    #[error("图像处理失败: {0}")]
    ImageProcess(String),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),
}
