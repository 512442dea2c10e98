// environment.rs - HDR 环境贴图解码 + CPU 预过滤 mip 链
//
// 反射采样按粗糙度选择 mip 层级，所以这里把等距柱状投影图逐级 2x2 盒式下采样
// （水平方向环绕）。

use image::io::Reader as ImageReader;
use std::io::Cursor;

use crate::error::ViewerError;

#[derive(Debug, Clone, PartialEq)]
pub struct MipLevel {
    pub width: u32,
    pub height: u32,
    pub texels: Vec<[f32; 4]>,
}

impl MipLevel {
    fn texel(&self, x: u32, y: u32) -> [f32; 4] {
        self.texels[(y * self.width + x) as usize]
    }

    fn downsample(&self) -> MipLevel {
        let width = (self.width / 2).max(1);
        let height = (self.height / 2).max(1);
        let mut texels = Vec::with_capacity((width * height) as usize);

        for y in 0..height {
            let y0 = (y * 2).min(self.height - 1);
            let y1 = (y * 2 + 1).min(self.height - 1);
            for x in 0..width {
                let x0 = (x * 2) % self.width;
                let x1 = (x * 2 + 1) % self.width;
                let samples = [
                    self.texel(x0, y0),
                    self.texel(x1, y0),
                    self.texel(x0, y1),
                    self.texel(x1, y1),
                ];
                let mut sum = [0.0f32; 4];
                for s in samples {
                    for c in 0..4 {
                        sum[c] += s[c];
                    }
                }
                texels.push(sum.map(|v| v * 0.25));
            }
        }

        MipLevel {
            width,
            height,
            texels,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EnvironmentMap {
    /// Level 0 is the full-resolution panorama.
    pub levels: Vec<MipLevel>,
}

impl EnvironmentMap {
    pub fn decode(bytes: &[u8]) -> Result<Self, ViewerError> {
        let mut reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(image::ImageError::IoError)?;
        reader.no_limits();
        let img = reader.decode()?.into_rgba32f();
        let (width, height) = img.dimensions();
        let texels = img
            .into_raw()
            .chunks_exact(4)
            .map(|c| [c[0], c[1], c[2], c[3]])
            .collect();
        log::info!("environment map {width}x{height}");
        Ok(Self::from_base(MipLevel {
            width,
            height,
            texels,
        }))
    }

    pub fn from_base(base: MipLevel) -> Self {
        let mut levels = vec![base];
        loop {
            let last = &levels[levels.len() - 1];
            if last.width == 1 && last.height == 1 {
                break;
            }
            let next = last.downsample();
            levels.push(next);
        }
        Self { levels }
    }

    pub fn width(&self) -> u32 {
        self.levels[0].width
    }

    pub fn height(&self) -> u32 {
        self.levels[0].height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(width: u32, height: u32, f: impl Fn(u32, u32) -> f32) -> MipLevel {
        let mut texels = Vec::new();
        for y in 0..height {
            for x in 0..width {
                let v = f(x, y);
                texels.push([v, v, v, 1.0]);
            }
        }
        MipLevel {
            width,
            height,
            texels,
        }
    }

    #[test]
    fn chain_halves_down_to_one_texel() {
        let env = EnvironmentMap::from_base(level(8, 4, |_, _| 1.0));
        let sizes: Vec<(u32, u32)> = env.levels.iter().map(|l| (l.width, l.height)).collect();
        assert_eq!(sizes, vec![(8, 4), (4, 2), (2, 1), (1, 1)]);
    }

    #[test]
    fn last_level_is_the_average() {
        let env = EnvironmentMap::from_base(level(4, 2, |x, y| (x + 4 * y) as f32));
        let last = env.levels.last().unwrap();
        assert!((last.texels[0][0] - 3.5).abs() < 1e-5);
        assert_eq!(last.texels[0][3], 1.0);
    }

    #[test]
    fn odd_width_wraps_horizontally() {
        let env = EnvironmentMap::from_base(level(3, 1, |x, _| x as f32));
        // 3x1 -> 1x1 只取 x0=0, x1=1 两列
        assert_eq!(env.levels.len(), 2);
        assert!((env.levels[1].texels[0][0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(EnvironmentMap::decode(b"definitely not an image").is_err());
    }
}
