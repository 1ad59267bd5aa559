//! 图像预处理模块
//!
//! 一张证件照片生成多种预处理变体，按固定顺序交给 OCR 引擎尝试。
//! 所有变体都基于灰度图；前三种共享一次非局部均值降噪的结果，
//! 对比度增强（CLAHE）直接作用在未降噪的灰度图上。

use image::{DynamicImage, GrayImage, Luma};
use imageproc::contrast::otsu_level;
use imageproc::filter::gaussian_blur_f32;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Instant;

use crate::error::OcrError;

/// 非局部均值降噪参数
pub const NLM_STRENGTH: f32 = 10.0;
pub const NLM_TEMPLATE_WINDOW: u32 = 7;
pub const NLM_SEARCH_WINDOW: u32 = 21;

/// 自适应阈值参数
pub const ADAPTIVE_BLOCK_SIZE: u32 = 11;
pub const ADAPTIVE_OFFSET: i32 = 2;

/// CLAHE 参数
pub const CLAHE_CLIP_LIMIT: f32 = 2.0;
pub const CLAHE_TILE_GRID: u32 = 8;

/// 权重低于此值的邻域块不参与平均
const NLM_WEIGHT_THRESHOLD: f32 = 0.001;

/// 预处理变体类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VariantKind {
    /// 高斯加权的局部自适应阈值
    AdaptiveThreshold,
    /// Otsu 全局阈值
    OtsuThreshold,
    /// 降噪后的灰度图
    DenoisedGrayscale,
    /// CLAHE 对比度增强
    ContrastEnhanced,
}

impl VariantKind {
    /// 默认尝试顺序（只代表优先级）
    pub const DEFAULT_ORDER: [VariantKind; 4] = [
        VariantKind::AdaptiveThreshold,
        VariantKind::OtsuThreshold,
        VariantKind::DenoisedGrayscale,
        VariantKind::ContrastEnhanced,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            VariantKind::AdaptiveThreshold => "adaptive-threshold",
            VariantKind::OtsuThreshold => "otsu-threshold",
            VariantKind::DenoisedGrayscale => "denoised-grayscale",
            VariantKind::ContrastEnhanced => "contrast-enhanced",
        }
    }

    fn needs_denoised(&self) -> bool {
        !matches!(self, VariantKind::ContrastEnhanced)
    }
}

impl fmt::Display for VariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for VariantKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VariantKind::DEFAULT_ORDER
            .iter()
            .copied()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| format!("未知的预处理方式: {}", s))
    }
}

/// 一个预处理后的图像
#[derive(Debug, Clone)]
pub struct ImageVariant {
    pub kind: VariantKind,
    pub image: GrayImage,
}

impl ImageVariant {
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn to_dynamic(&self) -> DynamicImage {
        DynamicImage::ImageLuma8(self.image.clone())
    }
}

/// 读取原图
pub fn load_source(path: &Path) -> Result<DynamicImage, OcrError> {
    image::open(path).map_err(|e| OcrError::ImageRead(format!("{}: {}", path.display(), e)))
}

/// 按默认顺序生成全部变体
pub fn generate_all(img: &DynamicImage) -> Vec<ImageVariant> {
    generate(img, &VariantKind::DEFAULT_ORDER)
}

/// 按请求的顺序生成变体
pub fn generate(img: &DynamicImage, kinds: &[VariantKind]) -> Vec<ImageVariant> {
    let start = Instant::now();
    let gray = img.to_luma8();

    let denoised = if kinds.iter().any(VariantKind::needs_denoised) {
        Some(nl_means_denoise(
            &gray,
            NLM_STRENGTH,
            NLM_TEMPLATE_WINDOW,
            NLM_SEARCH_WINDOW,
        ))
    } else {
        None
    };
    // 需要降噪图的变体一定已经算过降噪
    let base = denoised.as_ref().unwrap_or(&gray);

    let variants: Vec<ImageVariant> = kinds
        .iter()
        .map(|&kind| {
            let image = match kind {
                VariantKind::AdaptiveThreshold => {
                    adaptive_gaussian_threshold(base, ADAPTIVE_BLOCK_SIZE, ADAPTIVE_OFFSET)
                }
                VariantKind::OtsuThreshold => otsu_threshold(base),
                VariantKind::DenoisedGrayscale => base.clone(),
                VariantKind::ContrastEnhanced => clahe(&gray, CLAHE_CLIP_LIMIT, CLAHE_TILE_GRID),
            };
            ImageVariant { kind, image }
        })
        .collect();

    log::info!(
        "[Preprocess] 生成 {} 个变体 ({}x{})，耗时: {} ms",
        variants.len(),
        gray.width(),
        gray.height(),
        start.elapsed().as_millis()
    );

    variants
}

/// 非局部均值降噪
///
/// 对搜索窗口内的每个位移计算一次差分平方的积分图，
/// 使每个像素的模板距离可以 O(1) 得到。边界按镜像（不重复边缘像素）扩展。
pub fn nl_means_denoise(
    gray: &GrayImage,
    strength: f32,
    template_window: u32,
    search_window: u32,
) -> GrayImage {
    let (w, h) = gray.dimensions();
    if w == 0 || h == 0 {
        return gray.clone();
    }

    let tr = (template_window / 2) as i64;
    let sr = (search_window / 2) as i64;
    let pad = tr + sr;
    let pw = w as i64 + 2 * pad;
    let ph = h as i64 + 2 * pad;

    let padded: Vec<i32> = (0..ph)
        .flat_map(|y| {
            (0..pw).map(move |x| {
                let sx = reflect101(x - pad, w);
                let sy = reflect101(y - pad, h);
                gray.get_pixel(sx, sy)[0] as i32
            })
        })
        .collect();

    // 模板像素数与距离到权重的查找表
    let template_area = ((2 * tr + 1) * (2 * tr + 1)) as u64;
    let h2 = strength * strength;
    let weight_lut: Vec<f32> = (0..=255u32 * 255)
        .map(|d| {
            let weight = (-(d as f32) / h2).exp();
            if weight < NLM_WEIGHT_THRESHOLD {
                0.0
            } else {
                weight
            }
        })
        .collect();

    // 积分区域覆盖所有输出像素的模板
    let rw = w as i64 + 2 * tr;
    let rh = h as i64 + 2 * tr;
    let stride = (rw + 1) as usize;
    let mut integral = vec![0u64; stride * (rh + 1) as usize];

    let pixel_count = (w * h) as usize;
    let mut sum_weights = vec![0f32; pixel_count];
    let mut sum_values = vec![0f32; pixel_count];

    for dy in -sr..=sr {
        for dx in -sr..=sr {
            let shift = dy * pw + dx;

            for ry in 0..rh {
                let mut row_sum = 0u64;
                let row_base = (ry + sr) * pw + sr;
                for rx in 0..rw {
                    let a = (row_base + rx) as usize;
                    let b = (row_base + rx + shift) as usize;
                    let diff = padded[a] - padded[b];
                    row_sum += (diff * diff) as u64;

                    let idx = (ry as usize + 1) * stride + rx as usize + 1;
                    integral[idx] = integral[idx - stride] + row_sum;
                }
            }

            let span = (2 * tr + 1) as usize;
            for y in 0..h as usize {
                for x in 0..w as usize {
                    let top = y * stride;
                    let bottom = (y + span) * stride;
                    let dist = integral[bottom + x + span] + integral[top + x]
                        - integral[top + x + span]
                        - integral[bottom + x];

                    let weight = weight_lut[(dist / template_area) as usize];
                    if weight == 0.0 {
                        continue;
                    }

                    let neighbor = ((y as i64 + pad) * pw + x as i64 + pad + shift) as usize;
                    let i = y * w as usize + x;
                    sum_weights[i] += weight;
                    sum_values[i] += weight * padded[neighbor] as f32;
                }
            }
        }
    }

    GrayImage::from_fn(w, h, |x, y| {
        let i = (y * w + x) as usize;
        // 零位移的权重恒为 1，分母不会为零
        let value = sum_values[i] / sum_weights[i];
        Luma([value.round().clamp(0.0, 255.0) as u8])
    })
}

/// 高斯加权的自适应阈值：像素大于局部加权均值减偏移量时置白
pub fn adaptive_gaussian_threshold(gray: &GrayImage, block_size: u32, offset: i32) -> GrayImage {
    let (w, h) = gray.dimensions();
    if w == 0 || h == 0 {
        return gray.clone();
    }

    let sigma = 0.3 * ((block_size.max(3) as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    let mean = gaussian_blur_f32(gray, sigma);

    GrayImage::from_fn(w, h, |x, y| {
        let pixel = gray.get_pixel(x, y)[0] as i32;
        let local = mean.get_pixel(x, y)[0] as i32;
        if pixel > local - offset {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Otsu 全局阈值二值化
pub fn otsu_threshold(gray: &GrayImage) -> GrayImage {
    if gray.width() == 0 || gray.height() == 0 {
        return gray.clone();
    }
    let level = otsu_level(gray);
    log::debug!("[Preprocess] Otsu 阈值: {}", level);
    binarize(gray, level)
}

fn binarize(gray: &GrayImage, level: u8) -> GrayImage {
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        if gray.get_pixel(x, y)[0] > level {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// 限制对比度的自适应直方图均衡（CLAHE）
///
/// 图像划分为 `grid x grid` 个块，每块的直方图按 `clip_limit` 截断并把多出的
/// 计数平均分配回去，再由相邻四块的映射表双线性插值得到输出。
pub fn clahe(gray: &GrayImage, clip_limit: f32, grid: u32) -> GrayImage {
    let (w, h) = gray.dimensions();
    if w == 0 || h == 0 || grid == 0 {
        return gray.clone();
    }

    let tiles_x = grid.min(w);
    let tiles_y = grid.min(h);

    let mut luts: Vec<[u8; 256]> = Vec::with_capacity((tiles_x * tiles_y) as usize);
    for ty in 0..tiles_y {
        let (y0, y1) = tile_bounds(ty, tiles_y, h);
        for tx in 0..tiles_x {
            let (x0, x1) = tile_bounds(tx, tiles_x, w);
            luts.push(tile_lut(gray, x0, x1, y0, y1, clip_limit));
        }
    }

    GrayImage::from_fn(w, h, |x, y| {
        let (tx0, tx1, wx) = interpolation_axis(x, w, tiles_x);
        let (ty0, ty1, wy) = interpolation_axis(y, h, tiles_y);
        let p = gray.get_pixel(x, y)[0] as usize;

        let lut = |tx: u32, ty: u32| luts[(ty * tiles_x + tx) as usize][p] as f32;
        let top = (1.0 - wx) * lut(tx0, ty0) + wx * lut(tx1, ty0);
        let bottom = (1.0 - wx) * lut(tx0, ty1) + wx * lut(tx1, ty1);
        let value = (1.0 - wy) * top + wy * bottom;

        Luma([value.round().clamp(0.0, 255.0) as u8])
    })
}

fn tile_bounds(index: u32, tiles: u32, size: u32) -> (u32, u32) {
    let start = (index as u64 * size as u64 / tiles as u64) as u32;
    let end = ((index as u64 + 1) * size as u64 / tiles as u64) as u32;
    (start, end)
}

/// 返回相邻两块的下标和后一块的插值权重
fn interpolation_axis(pos: u32, size: u32, tiles: u32) -> (u32, u32, f32) {
    let f = (pos as f32 + 0.5) * tiles as f32 / size as f32 - 0.5;
    let lower = f.floor();
    let weight = f - lower;
    let last = tiles as i64 - 1;
    let t0 = (lower as i64).clamp(0, last) as u32;
    let t1 = (lower as i64 + 1).clamp(0, last) as u32;
    (t0, t1, weight)
}

fn tile_lut(gray: &GrayImage, x0: u32, x1: u32, y0: u32, y1: u32, clip_limit: f32) -> [u8; 256] {
    let mut hist = [0u32; 256];
    for y in y0..y1 {
        for x in x0..x1 {
            hist[gray.get_pixel(x, y)[0] as usize] += 1;
        }
    }

    let area = (x1 - x0) * (y1 - y0);
    let mut lut = [0u8; 256];
    if area == 0 {
        for (i, slot) in lut.iter_mut().enumerate() {
            *slot = i as u8;
        }
        return lut;
    }

    if clip_limit > 0.0 {
        let clip = ((clip_limit * area as f32 / 256.0) as u32).max(1);
        let mut excess = 0u32;
        for bin in hist.iter_mut() {
            if *bin > clip {
                excess += *bin - clip;
                *bin = clip;
            }
        }

        let batch = excess / 256;
        let residual = excess % 256;
        for bin in hist.iter_mut() {
            *bin += batch;
        }
        if residual > 0 {
            let step = (256 / residual).max(1) as usize;
            for bin in hist.iter_mut().step_by(step).take(residual as usize) {
                *bin += 1;
            }
        }
    }

    let scale = 255.0 / area as f32;
    let mut cumulative = 0u32;
    for (slot, &count) in lut.iter_mut().zip(hist.iter()) {
        cumulative += count;
        *slot = (cumulative as f32 * scale).round().min(255.0) as u8;
    }
    lut
}

/// 镜像下标，边缘像素不重复（与 OpenCV BORDER_REFLECT_101 一致）
fn reflect101(i: i64, size: u32) -> u32 {
    let n = size as i64;
    if n == 1 {
        return 0;
    }
    let period = 2 * (n - 1);
    let mut i = i.rem_euclid(period);
    if i >= n {
        i = period - i;
    }
    i as u32
}
