//! 待识别的原始图片

use idcheck_ocr::{load_source, OcrError};
use image::DynamicImage;
use std::path::{Path, PathBuf};

use crate::{CoreError, Result};

/// 解码后的原图，以及它来自的文件路径（如果有）
#[derive(Debug, Clone)]
pub struct SourceImage {
    image: DynamicImage,
    path: Option<PathBuf>,
}

impl SourceImage {
    /// 从文件读取
    pub fn open(path: &Path) -> Result<Self> {
        let image = load_source(path).map_err(|e| match e {
            OcrError::ImageRead(msg) => CoreError::ImageRead(msg),
            other => CoreError::ImageRead(other.to_string()),
        })?;
        Ok(Self {
            image,
            path: Some(path.to_path_buf()),
        })
    }

    pub fn from_image(image: DynamicImage) -> Self {
        Self { image, path: None }
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// 不含目录的文件名
    pub fn file_name(&self) -> Option<String> {
        self.path
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|name| name.to_string_lossy().to_string())
    }
}
