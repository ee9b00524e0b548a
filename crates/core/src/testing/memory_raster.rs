//! In-memory raster backend for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::raster::projection::WGS84;
use crate::raster::{
    Band, ByteBand, ColorRamp, DatasetInfo, GeoTransform, PixelWindow, Polarization,
    RasterBackend, RasterError, RasterImage, RasterProfile, SubdatasetRef,
};

#[derive(Debug, Clone)]
struct MemDataset {
    info: DatasetInfo,
    bands: Vec<Band>,
}

#[derive(Debug, Default)]
struct ProductEntry {
    subdatasets: HashMap<usize, String>,
    amplitudes: HashMap<Polarization, String>,
}

#[derive(Debug, Default)]
struct State {
    /// Product subdatasets by source name.
    datasets: HashMap<String, MemDataset>,
    products: HashMap<PathBuf, ProductEntry>,
    /// Datasets that exist as files (written images and reprojections).
    files: HashMap<PathBuf, MemDataset>,
    images: HashMap<PathBuf, RasterImage>,
    masks: HashMap<PathBuf, ByteBand>,
    windows: Vec<Option<PixelWindow>>,
    opens: usize,
    reads: usize,
    writes: usize,
    reprojects: usize,
    color_ramps: usize,
    fail_opens: bool,
    fail_writes: bool,
}

/// Raster backend holding synthetic products in memory.
///
/// Writes also create a placeholder file on disk so output-exists checks and
/// renames behave as with a real backend. Lookups by a final output path
/// also find an image written under its hidden `.partial.tif` name.
///
/// Synthetic bands hold nodata (0) in their first pixel and varying positive
/// values elsewhere.
#[derive(Debug, Default)]
pub struct MemoryRasterBackend {
    state: Arc<RwLock<State>>,
}

impl MemoryRasterBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an S2 product covering lon 10..11, lat 45..46 in EPSG:4326.
    ///
    /// Subdatasets: 0 (4 bands), 1 (6 bands), 2 (3 bands), 3 (TCI, 3 bands).
    pub async fn add_s2_product(&self, manifest: &Path, width: usize, height: usize) {
        let transform =
            GeoTransform::north_up(10.0, 46.0, 1.0 / width as f64, 1.0 / height as f64);
        self.add_s2_product_with_geometry(manifest, width, height, transform, WGS84)
            .await;
    }

    /// Register an S2 product with explicit georeferencing.
    pub async fn add_s2_product_with_geometry(
        &self,
        manifest: &Path,
        width: usize,
        height: usize,
        transform: GeoTransform,
        epsg: u32,
    ) {
        let mut state = self.state.write().await;
        let mut entry = ProductEntry::default();
        for (index, band_count) in [(0usize, 4usize), (1, 6), (2, 3), (3, 3)] {
            let source = format!("{}:{}", manifest.display(), index);
            state.datasets.insert(
                source.clone(),
                synthetic_dataset(&source, width, height, band_count, transform, epsg),
            );
            entry.subdatasets.insert(index, source);
        }
        state.products.insert(manifest.to_path_buf(), entry);
    }

    /// Register an S1 product with VV and VH amplitudes in UTM 32N.
    pub async fn add_s1_product(&self, manifest: &Path, width: usize, height: usize) {
        let transform = GeoTransform::north_up(600_000.0, 5_100_000.0, 10.0, 10.0);
        let mut state = self.state.write().await;
        let mut entry = ProductEntry::default();
        for pol in [Polarization::Vv, Polarization::Vh] {
            let source = format!("{}:{}", manifest.display(), pol);
            state.datasets.insert(
                source.clone(),
                synthetic_dataset(&source, width, height, 1, transform, 32632),
            );
            entry.amplitudes.insert(pol, source);
        }
        state.products.insert(manifest.to_path_buf(), entry);
    }

    /// Drop one subdataset of a registered product.
    pub async fn remove_subdataset(&self, manifest: &Path, index: usize) {
        if let Some(entry) = self.state.write().await.products.get_mut(manifest) {
            entry.subdatasets.remove(&index);
        }
    }

    pub async fn fail_opens(&self, fail: bool) {
        self.state.write().await.fail_opens = fail;
    }

    pub async fn fail_writes(&self, fail: bool) {
        self.state.write().await.fail_writes = fail;
    }

    pub async fn open_count(&self) -> usize {
        self.state.read().await.opens
    }

    pub async fn read_count(&self) -> usize {
        self.state.read().await.reads
    }

    /// Image writes, color-ramp renders included.
    pub async fn write_count(&self) -> usize {
        self.state.read().await.writes
    }

    pub async fn reproject_count(&self) -> usize {
        self.state.read().await.reprojects
    }

    pub async fn color_ramp_count(&self) -> usize {
        self.state.read().await.color_ramps
    }

    /// Windows passed to every read, in call order.
    pub async fn recorded_windows(&self) -> Vec<Option<PixelWindow>> {
        self.state.read().await.windows.clone()
    }

    pub async fn written_image(&self, path: &Path) -> Option<RasterImage> {
        lookup(&self.state.read().await.images, path).cloned()
    }

    pub async fn written_mask(&self, path: &Path) -> Option<ByteBand> {
        let state = self.state.read().await;
        lookup(&state.masks, path)
            .or_else(|| lookup(&state.images, path).and_then(|i| i.mask.as_ref()))
            .cloned()
    }

    async fn store_image(&self, image: RasterImage, path: &Path) -> Result<(), RasterError> {
        let mut state = self.state.write().await;
        if state.fail_writes {
            return Err(RasterError::command_failed("mock", "ERROR 1: mock write failure"));
        }
        tokio::fs::write(path, b"mock-gtiff").await?;
        state.writes += 1;
        state
            .files
            .insert(path.to_path_buf(), dataset_from_image(&image, path));
        state.images.insert(path.to_path_buf(), image);
        Ok(())
    }
}

fn synthetic_dataset(
    source: &str,
    width: usize,
    height: usize,
    band_count: usize,
    transform: GeoTransform,
    epsg: u32,
) -> MemDataset {
    let bands = (0..band_count)
        .map(|b| {
            let step = b * 7 + 3;
            let data = (0..width * height)
                .map(|i| if i == 0 { 0.0 } else { ((i * step) % 101 + 1) as f32 })
                .collect();
            Band {
                width,
                height,
                data,
            }
        })
        .collect();
    MemDataset {
        info: DatasetInfo {
            source: source.to_string(),
            width,
            height,
            band_count,
            transform,
            epsg: Some(epsg),
        },
        bands,
    }
}

fn dataset_from_image(image: &RasterImage, path: &Path) -> MemDataset {
    let profile = &image.profile;
    MemDataset {
        info: DatasetInfo {
            source: path.display().to_string(),
            width: profile.width,
            height: profile.height,
            band_count: image.bands.len(),
            transform: profile.transform,
            epsg: profile.epsg,
        },
        bands: image
            .bands
            .iter()
            .map(|b| Band {
                width: b.width,
                height: b.height,
                data: b.data.iter().map(|&v| f32::from(v)).collect(),
            })
            .collect(),
    }
}

/// Entry for `path`, or for the hidden partial file it was renamed from.
fn lookup<'a, V>(map: &'a HashMap<PathBuf, V>, path: &Path) -> Option<&'a V> {
    if let Some(v) = map.get(path) {
        return Some(v);
    }
    let stem = path.file_stem()?.to_str()?;
    let prefix = format!(".{}.", stem);
    map.iter()
        .find(|(k, _)| {
            k.parent() == path.parent()
                && k
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(&prefix) && n.ends_with(".partial.tif"))
        })
        .map(|(_, v)| v)
}

fn find_dataset<'a>(state: &'a State, source: &str) -> Option<&'a MemDataset> {
    state
        .datasets
        .get(source)
        .or_else(|| lookup(&state.files, Path::new(source)))
}

#[async_trait]
impl RasterBackend for MemoryRasterBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn open_subdataset(
        &self,
        manifest: &Path,
        subdataset: SubdatasetRef,
    ) -> Result<DatasetInfo, RasterError> {
        let mut state = self.state.write().await;
        state.opens += 1;
        let source_name = manifest.display().to_string();
        if state.fail_opens {
            return Err(RasterError::OpenFailed {
                source_name,
                reason: "mock open failure".to_string(),
            });
        }
        let entry = state
            .products
            .get(manifest)
            .ok_or_else(|| RasterError::OpenFailed {
                source_name: source_name.clone(),
                reason: "no such product".to_string(),
            })?;
        let source = match subdataset {
            SubdatasetRef::Index(index) => entry
                .subdatasets
                .get(&index)
                .ok_or(RasterError::SubdatasetNotFound {
                    source_name: source_name.clone(),
                    index,
                })?,
            SubdatasetRef::Amplitude(pol) => {
                entry
                    .amplitudes
                    .get(&pol)
                    .ok_or_else(|| RasterError::OpenFailed {
                        source_name: source_name.clone(),
                        reason: format!("no {} amplitude", pol),
                    })?
            }
        };
        state
            .datasets
            .get(source)
            .map(|d| d.info.clone())
            .ok_or(RasterError::OpenFailed {
                source_name,
                reason: "dataset missing".to_string(),
            })
    }

    async fn open(&self, path: &Path) -> Result<DatasetInfo, RasterError> {
        let mut state = self.state.write().await;
        state.opens += 1;
        let source_name = path.display().to_string();
        if state.fail_opens {
            return Err(RasterError::OpenFailed {
                source_name,
                reason: "mock open failure".to_string(),
            });
        }
        lookup(&state.files, path)
            .map(|d| d.info.clone())
            .ok_or(RasterError::OpenFailed {
                source_name,
                reason: "no such file".to_string(),
            })
    }

    async fn read_window(
        &self,
        dataset: &DatasetInfo,
        bands: &[usize],
        window: Option<&PixelWindow>,
    ) -> Result<Vec<Band>, RasterError> {
        let mut state = self.state.write().await;
        state.reads += 1;
        state.windows.push(window.copied());

        let mem = find_dataset(&state, &dataset.source).ok_or_else(|| RasterError::OpenFailed {
            source_name: dataset.source.clone(),
            reason: "unknown dataset".to_string(),
        })?;
        let window = window.copied().unwrap_or_else(|| mem.info.full_window());
        if window.col_off + window.width > mem.info.width
            || window.row_off + window.height > mem.info.height
        {
            return Err(RasterError::ShapeMismatch {
                left: (window.col_off + window.width, window.row_off + window.height),
                right: (mem.info.width, mem.info.height),
            });
        }

        bands
            .iter()
            .map(|&b| {
                let band = b
                    .checked_sub(1)
                    .and_then(|i| mem.bands.get(i))
                    .ok_or(RasterError::BandOutOfRange {
                        band: b,
                        band_count: mem.info.band_count,
                    })?;
                let mut data = Vec::with_capacity(window.width * window.height);
                for row in window.row_off..window.row_off + window.height {
                    let start = row * band.width + window.col_off;
                    data.extend_from_slice(&band.data[start..start + window.width]);
                }
                Band::new(window.width, window.height, data)
            })
            .collect()
    }

    async fn write_image(&self, image: &RasterImage, path: &Path) -> Result<(), RasterError> {
        self.store_image(image.clone(), path).await
    }

    async fn write_mask(&self, path: &Path, mask: &ByteBand) -> Result<(), RasterError> {
        let mut state = self.state.write().await;
        if state.fail_writes {
            return Err(RasterError::command_failed("mock", "ERROR 1: mock mask failure"));
        }
        if let Some(image) = state.images.get_mut(path) {
            image.mask = Some(mask.clone());
        }
        state.masks.insert(path.to_path_buf(), mask.clone());
        Ok(())
    }

    async fn reproject(
        &self,
        source: &DatasetInfo,
        dst_epsg: u32,
        dest: &Path,
        add_alpha: bool,
    ) -> Result<DatasetInfo, RasterError> {
        let mut state = self.state.write().await;
        let mut mem = find_dataset(&state, &source.source)
            .cloned()
            .ok_or_else(|| RasterError::OpenFailed {
                source_name: source.source.clone(),
                reason: "unknown dataset".to_string(),
            })?;
        tokio::fs::write(dest, b"mock-warped").await?;
        state.reprojects += 1;

        if add_alpha {
            mem.bands
                .push(Band::filled(mem.info.width, mem.info.height, 255.0));
        }
        mem.info = DatasetInfo {
            source: dest.display().to_string(),
            band_count: mem.bands.len(),
            epsg: Some(dst_epsg),
            ..mem.info
        };
        let info = mem.info.clone();
        state.files.insert(dest.to_path_buf(), mem);
        Ok(info)
    }

    async fn apply_color_ramp(
        &self,
        band: &Band,
        profile: &RasterProfile,
        ramp: &ColorRamp,
        path: &Path,
    ) -> Result<(), RasterError> {
        let mut channels: Vec<Vec<u8>> = vec![Vec::with_capacity(band.data.len()); 3];
        for &value in &band.data {
            let rgb = ramp.color_at(f64::from(value)).unwrap_or([0, 0, 0]);
            for (channel, v) in channels.iter_mut().zip(rgb) {
                channel.push(v);
            }
        }
        let image = RasterImage {
            bands: channels
                .into_iter()
                .map(|data| ByteBand {
                    width: band.width,
                    height: band.height,
                    data,
                })
                .collect(),
            mask: None,
            profile: profile.clone(),
        };
        self.store_image(image, path).await?;
        self.state.write().await.color_ramps += 1;
        Ok(())
    }
}
