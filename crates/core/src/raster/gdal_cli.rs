//! Raster backend driving the GDAL command-line tools.
//!
//! Samples travel between this process and GDAL as raw band-sequential files
//! described by VRT documents: reads go through `gdal_translate -of ENVI`,
//! writes through a raw VRT translated into a deflate-compressed GeoTIFF with
//! an internal mask.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use serde_json::Value;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{
    Band, ByteBand, ColorRamp, DatasetInfo, GeoTransform, PixelWindow, RasterBackend,
    RasterConfig, RasterError, RasterImage, RasterProfile, SubdatasetRef,
};

static WKT_EPSG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?:ID|AUTHORITY)\["EPSG",\s*"?(\d+)"?\]\]\s*$"#).unwrap());

/// GDAL command-line raster backend.
pub struct GdalCliBackend {
    config: RasterConfig,
}

impl GdalCliBackend {
    pub fn new(config: RasterConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(RasterConfig::default())
    }

    /// Run a tool to completion, returning stdout.
    async fn run_tool(&self, tool: &Path, args: &[OsString]) -> Result<String, RasterError> {
        let tool_name = tool
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| tool.display().to_string());
        debug!(tool = %tool_name, ?args, "Running raster tool");

        let child = Command::new(tool)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    RasterError::ToolNotFound {
                        path: tool.to_path_buf(),
                    }
                } else {
                    RasterError::Io(e)
                }
            })?;

        let timeout_duration = Duration::from_secs(self.config.timeout_secs);
        let output = match timeout(timeout_duration, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(RasterError::Timeout {
                    tool: tool_name,
                    timeout_secs: self.config.timeout_secs,
                })
            }
        };

        if !output.status.success() {
            return Err(RasterError::command_failed(
                tool_name,
                String::from_utf8_lossy(&output.stderr),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn gdalinfo(&self, source: &str) -> Result<Value, RasterError> {
        let args: Vec<OsString> = vec!["-json".into(), source.into()];
        let stdout = self.run_tool(&self.config.gdalinfo_path, &args).await?;
        serde_json::from_str(&stdout).map_err(|e| RasterError::Parse(e.to_string()))
    }

    async fn open_name(&self, source: &str) -> Result<DatasetInfo, RasterError> {
        let info = self.gdalinfo(source).await.map_err(|e| match e {
            RasterError::CommandFailed { reason, .. } => RasterError::OpenFailed {
                source_name: source.to_string(),
                reason,
            },
            other => other,
        })?;
        parse_info(source, &info)
    }

    /// Fresh scratch directory for one backend call.
    async fn scratch_dir(&self) -> Result<PathBuf, RasterError> {
        let dir = self.config.temp_dir.join(Uuid::new_v4().to_string());
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    async fn remove_scratch(dir: &Path) {
        if let Err(e) = tokio::fs::remove_dir_all(dir).await {
            warn!(dir = %dir.display(), error = %e, "Failed to remove raster scratch directory");
        }
    }

    async fn translate_to_gtiff(
        &self,
        vrt: &Path,
        dest: &Path,
        band_count: usize,
    ) -> Result<(), RasterError> {
        let mut args: Vec<OsString> = vec![
            "-q".into(),
            "-of".into(),
            "GTiff".into(),
            "-co".into(),
            "COMPRESS=DEFLATE".into(),
            "-co".into(),
            "TILED=YES".into(),
            "--config".into(),
            "GDAL_TIFF_INTERNAL_MASK".into(),
            "YES".into(),
        ];
        if band_count == 3 {
            args.push("-co".into());
            args.push("PHOTOMETRIC=RGB".into());
        }
        args.push(vrt.into());
        args.push(dest.into());
        self.run_tool(&self.config.gdal_translate_path, &args).await?;
        Ok(())
    }

    async fn write_image_in(
        &self,
        scratch: &Path,
        image: &RasterImage,
        path: &Path,
    ) -> Result<(), RasterError> {
        let profile = &image.profile;
        let mut raw = Vec::with_capacity(profile.width * profile.height * image.bands.len());
        for band in &image.bands {
            if band.shape() != (profile.width, profile.height) {
                return Err(RasterError::ShapeMismatch {
                    left: band.shape(),
                    right: (profile.width, profile.height),
                });
            }
            raw.extend_from_slice(&band.data);
        }
        tokio::fs::write(scratch.join("image.bin"), &raw).await?;

        let mask_file = match &image.mask {
            Some(mask) => {
                tokio::fs::write(scratch.join("mask.bin"), mask_bytes(mask)).await?;
                Some("mask.bin")
            }
            None => None,
        };

        let vrt = raw_vrt(
            profile,
            &RawLayout {
                file: "image.bin",
                data_type: "Byte",
                sample_size: 1,
                band_count: image.bands.len(),
                nodata: None,
            },
            mask_file,
        );
        let vrt_path = scratch.join("image.vrt");
        tokio::fs::write(&vrt_path, vrt).await?;
        self.translate_to_gtiff(&vrt_path, path, image.bands.len())
            .await
    }

    async fn read_window_in(
        &self,
        scratch: &Path,
        dataset: &DatasetInfo,
        bands: &[usize],
        window: &PixelWindow,
    ) -> Result<Vec<Band>, RasterError> {
        let out = scratch.join("read.bin");
        let mut args: Vec<OsString> = vec![
            "-q".into(),
            "-of".into(),
            "ENVI".into(),
            "-ot".into(),
            "Float32".into(),
        ];
        for band in bands {
            args.push("-b".into());
            args.push(band.to_string().into());
        }
        args.push("-srcwin".into());
        for v in [window.col_off, window.row_off, window.width, window.height] {
            args.push(v.to_string().into());
        }
        args.push(dataset.source.as_str().into());
        args.push(out.as_os_str().to_owned());
        self.run_tool(&self.config.gdal_translate_path, &args).await?;

        let big_endian = match tokio::fs::read_to_string(scratch.join("read.hdr")).await {
            Ok(header) => envi_is_big_endian(&header),
            Err(_) => false,
        };
        let bytes = tokio::fs::read(&out).await?;
        split_float_bands(&bytes, bands.len(), window.width, window.height, big_endian)
    }

    async fn write_mask_in(
        &self,
        scratch: &Path,
        path: &Path,
        mask: &ByteBand,
    ) -> Result<(), RasterError> {
        let info = self.open(path).await?;
        if (info.width, info.height) != mask.shape() {
            return Err(RasterError::ShapeMismatch {
                left: (info.width, info.height),
                right: mask.shape(),
            });
        }
        tokio::fs::write(scratch.join("mask.bin"), mask_bytes(mask)).await?;

        let profile = RasterProfile {
            width: info.width,
            height: info.height,
            transform: info.transform,
            epsg: info.epsg,
        };
        let vrt = source_vrt(&profile, path, info.band_count, "mask.bin");
        let vrt_path = scratch.join("masked.vrt");
        tokio::fs::write(&vrt_path, vrt).await?;

        let staged = scratch.join("masked.tif");
        self.translate_to_gtiff(&vrt_path, &staged, info.band_count)
            .await?;
        move_file(&staged, path).await
    }

    async fn apply_color_ramp_in(
        &self,
        scratch: &Path,
        band: &Band,
        profile: &RasterProfile,
        ramp: &ColorRamp,
        path: &Path,
    ) -> Result<(), RasterError> {
        let raw: Vec<u8> = band.data.iter().flat_map(|v| v.to_le_bytes()).collect();
        tokio::fs::write(scratch.join("band.bin"), raw).await?;

        let vrt = raw_vrt(
            profile,
            &RawLayout {
                file: "band.bin",
                data_type: "Float32",
                sample_size: 4,
                band_count: 1,
                nodata: Some("nan"),
            },
            None,
        );
        let vrt_path = scratch.join("band.vrt");
        tokio::fs::write(&vrt_path, vrt).await?;
        let ramp_path = scratch.join("ramp.txt");
        tokio::fs::write(&ramp_path, ramp.to_gdaldem_text()).await?;

        let args: Vec<OsString> = vec![
            "color-relief".into(),
            "-q".into(),
            vrt_path.into(),
            ramp_path.into(),
            path.into(),
            "-co".into(),
            "COMPRESS=DEFLATE".into(),
            "-co".into(),
            "TILED=YES".into(),
        ];
        self.run_tool(&self.config.gdaldem_path, &args).await?;
        Ok(())
    }
}

/// Rename, falling back to copy when crossing filesystems.
async fn move_file(from: &Path, to: &Path) -> Result<(), RasterError> {
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    tokio::fs::copy(from, to).await?;
    tokio::fs::remove_file(from).await?;
    Ok(())
}

/// GDAL masks use 255 for valid pixels.
fn mask_bytes(mask: &ByteBand) -> Vec<u8> {
    mask.data
        .iter()
        .map(|&v| if v == 0 { 0 } else { 255 })
        .collect()
}

fn envi_is_big_endian(header: &str) -> bool {
    header.lines().any(|line| {
        let mut parts = line.splitn(2, '=');
        matches!(
            (parts.next().map(str::trim), parts.next().map(str::trim)),
            (Some("byte order"), Some("1"))
        )
    })
}

/// Split a band-sequential Float32 buffer into bands.
fn split_float_bands(
    bytes: &[u8],
    band_count: usize,
    width: usize,
    height: usize,
    big_endian: bool,
) -> Result<Vec<Band>, RasterError> {
    let per_band = width * height;
    if bytes.len() != per_band * band_count * 4 {
        return Err(RasterError::Parse(format!(
            "expected {} bytes of samples, got {}",
            per_band * band_count * 4,
            bytes.len()
        )));
    }

    let samples: Vec<f32> = bytes
        .chunks_exact(4)
        .map(|c| {
            let b = [c[0], c[1], c[2], c[3]];
            if big_endian {
                f32::from_be_bytes(b)
            } else {
                f32::from_le_bytes(b)
            }
        })
        .collect();

    Ok(samples
        .chunks_exact(per_band.max(1))
        .take(band_count)
        .map(|chunk| Band {
            width,
            height,
            data: chunk.to_vec(),
        })
        .collect())
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn vrt_header(profile: &RasterProfile) -> String {
    let g = &profile.transform.0;
    let mut out = format!(
        "<VRTDataset rasterXSize=\"{}\" rasterYSize=\"{}\">\n",
        profile.width, profile.height
    );
    if let Some(epsg) = profile.epsg {
        out.push_str(&format!("  <SRS>EPSG:{}</SRS>\n", epsg));
    }
    out.push_str(&format!(
        "  <GeoTransform>{}, {}, {}, {}, {}, {}</GeoTransform>\n",
        g[0], g[1], g[2], g[3], g[4], g[5]
    ));
    out
}

fn raw_mask_band(file: &str, width: usize) -> String {
    format!(
        "  <MaskBand>\n    <VRTRasterBand dataType=\"Byte\" subClass=\"VRTRawRasterBand\">\n      \
         <SourceFilename relativeToVRT=\"1\">{}</SourceFilename>\n      \
         <ImageOffset>0</ImageOffset>\n      <PixelOffset>1</PixelOffset>\n      \
         <LineOffset>{}</LineOffset>\n    </VRTRasterBand>\n  </MaskBand>\n",
        xml_escape(file),
        width
    )
}

struct RawLayout<'a> {
    file: &'a str,
    data_type: &'a str,
    sample_size: usize,
    band_count: usize,
    nodata: Option<&'a str>,
}

/// VRT over a band-sequential little-endian raw file.
fn raw_vrt(profile: &RasterProfile, layout: &RawLayout<'_>, mask_file: Option<&str>) -> String {
    let mut out = vrt_header(profile);
    let band_bytes = profile.width * profile.height * layout.sample_size;
    for b in 0..layout.band_count {
        out.push_str(&format!(
            "  <VRTRasterBand dataType=\"{}\" band=\"{}\" subClass=\"VRTRawRasterBand\">\n",
            layout.data_type,
            b + 1
        ));
        if let Some(nodata) = layout.nodata {
            out.push_str(&format!("    <NoDataValue>{}</NoDataValue>\n", nodata));
        }
        out.push_str(&format!(
            "    <SourceFilename relativeToVRT=\"1\">{}</SourceFilename>\n    \
             <ImageOffset>{}</ImageOffset>\n    <PixelOffset>{}</PixelOffset>\n    \
             <LineOffset>{}</LineOffset>\n    <ByteOrder>LSB</ByteOrder>\n  </VRTRasterBand>\n",
            xml_escape(layout.file),
            b * band_bytes,
            layout.sample_size,
            profile.width * layout.sample_size
        ));
    }
    if let Some(mask) = mask_file {
        out.push_str(&raw_mask_band(mask, profile.width));
    }
    out.push_str("</VRTDataset>\n");
    out
}

/// VRT re-exposing the byte bands of an existing file, plus a raw mask.
fn source_vrt(profile: &RasterProfile, source: &Path, band_count: usize, mask_file: &str) -> String {
    let mut out = vrt_header(profile);
    let source = xml_escape(&source.to_string_lossy());
    for b in 1..=band_count {
        out.push_str(&format!(
            "  <VRTRasterBand dataType=\"Byte\" band=\"{b}\">\n    <SimpleSource>\n      \
             <SourceFilename relativeToVRT=\"0\">{source}</SourceFilename>\n      \
             <SourceBand>{b}</SourceBand>\n    </SimpleSource>\n  </VRTRasterBand>\n"
        ));
    }
    out.push_str(&raw_mask_band(mask_file, profile.width));
    out.push_str("</VRTDataset>\n");
    out
}

fn json_usize(value: &Value) -> Option<usize> {
    value.as_u64().map(|v| v as usize)
}

/// Build a `DatasetInfo` from `gdalinfo -json` output.
fn parse_info(source: &str, info: &Value) -> Result<DatasetInfo, RasterError> {
    let size = info
        .get("size")
        .and_then(Value::as_array)
        .ok_or_else(|| RasterError::Parse(format!("{}: missing size", source)))?;
    let (width, height) = match (size.first().and_then(json_usize), size.get(1).and_then(json_usize)) {
        (Some(w), Some(h)) => (w, h),
        _ => return Err(RasterError::Parse(format!("{}: invalid size", source))),
    };

    let transform = match info.get("geoTransform").and_then(Value::as_array) {
        Some(gt) if gt.len() == 6 => {
            let mut coeffs = [0.0; 6];
            for (slot, v) in coeffs.iter_mut().zip(gt) {
                *slot = v
                    .as_f64()
                    .ok_or_else(|| RasterError::Parse(format!("{}: bad geoTransform", source)))?;
            }
            GeoTransform(coeffs)
        }
        _ => GeoTransform([0.0, 1.0, 0.0, 0.0, 0.0, 1.0]),
    };

    let band_count = info
        .get("bands")
        .and_then(Value::as_array)
        .map(Vec::len)
        .unwrap_or(0);

    let epsg = info
        .pointer("/stac/proj:epsg")
        .and_then(Value::as_u64)
        .map(|v| v as u32)
        .or_else(|| {
            let wkt = info.pointer("/coordinateSystem/wkt")?.as_str()?;
            WKT_EPSG.captures(wkt)?.get(1)?.as_str().parse().ok()
        });

    Ok(DatasetInfo {
        source: source.to_string(),
        width,
        height,
        band_count,
        transform,
        epsg,
    })
}

/// Name of the zero-based subdataset `index` listed by `gdalinfo -json`.
fn subdataset_name(info: &Value, index: usize) -> Option<String> {
    let key = format!("SUBDATASET_{}_NAME", index + 1);
    info.pointer("/metadata/SUBDATASETS")
        .and_then(|m| m.get(&key))
        .or_else(|| info.pointer("/metadata/").and_then(|m| m.get(&key)))
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[async_trait]
impl RasterBackend for GdalCliBackend {
    fn name(&self) -> &str {
        "gdal-cli"
    }

    async fn open_subdataset(
        &self,
        manifest: &Path,
        subdataset: SubdatasetRef,
    ) -> Result<DatasetInfo, RasterError> {
        let manifest_name = manifest.to_string_lossy();
        match subdataset {
            SubdatasetRef::Index(index) => {
                let info = self.gdalinfo(&manifest_name).await?;
                let name = subdataset_name(&info, index).ok_or_else(|| {
                    RasterError::SubdatasetNotFound {
                        source_name: manifest_name.to_string(),
                        index,
                    }
                })?;
                self.open_name(&name).await
            }
            SubdatasetRef::Amplitude(pol) => {
                let name = format!(
                    "SENTINEL1_CALIB:UNCALIB:{}:IW_{}:AMPLITUDE",
                    manifest_name, pol
                );
                self.open_name(&name).await
            }
        }
    }

    async fn open(&self, path: &Path) -> Result<DatasetInfo, RasterError> {
        self.open_name(&path.to_string_lossy()).await
    }

    async fn read_window(
        &self,
        dataset: &DatasetInfo,
        bands: &[usize],
        window: Option<&PixelWindow>,
    ) -> Result<Vec<Band>, RasterError> {
        for &band in bands {
            if band == 0 || band > dataset.band_count {
                return Err(RasterError::BandOutOfRange {
                    band,
                    band_count: dataset.band_count,
                });
            }
        }
        let window = window.copied().unwrap_or_else(|| dataset.full_window());
        if window.is_empty() {
            return Err(RasterError::EmptyWindow);
        }

        let scratch = self.scratch_dir().await?;
        let result = self.read_window_in(&scratch, dataset, bands, &window).await;
        Self::remove_scratch(&scratch).await;
        result
    }

    async fn write_image(&self, image: &RasterImage, path: &Path) -> Result<(), RasterError> {
        let scratch = self.scratch_dir().await?;
        let result = self.write_image_in(&scratch, image, path).await;
        Self::remove_scratch(&scratch).await;
        result
    }

    async fn write_mask(&self, path: &Path, mask: &ByteBand) -> Result<(), RasterError> {
        let scratch = self.scratch_dir().await?;
        let result = self.write_mask_in(&scratch, path, mask).await;
        Self::remove_scratch(&scratch).await;
        result
    }

    async fn reproject(
        &self,
        source: &DatasetInfo,
        dst_epsg: u32,
        dest: &Path,
        add_alpha: bool,
    ) -> Result<DatasetInfo, RasterError> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut args: Vec<OsString> = vec![
            "-q".into(),
            "-overwrite".into(),
            "-t_srs".into(),
            format!("EPSG:{}", dst_epsg).into(),
            "-co".into(),
            "COMPRESS=DEFLATE".into(),
            "-co".into(),
            "TILED=YES".into(),
        ];
        if add_alpha {
            args.push("-dstalpha".into());
        }
        args.push(source.source.as_str().into());
        args.push(dest.into());
        self.run_tool(&self.config.gdalwarp_path, &args).await?;
        self.open(dest).await
    }

    async fn apply_color_ramp(
        &self,
        band: &Band,
        profile: &RasterProfile,
        ramp: &ColorRamp,
        path: &Path,
    ) -> Result<(), RasterError> {
        if band.shape() != (profile.width, profile.height) {
            return Err(RasterError::ShapeMismatch {
                left: band.shape(),
                right: (profile.width, profile.height),
            });
        }
        let scratch = self.scratch_dir().await?;
        let result = self
            .apply_color_ramp_in(&scratch, band, profile, ramp, path)
            .await;
        Self::remove_scratch(&scratch).await;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> RasterProfile {
        RasterProfile {
            width: 4,
            height: 2,
            transform: GeoTransform::north_up(600000.0, 5100000.0, 10.0, 10.0),
            epsg: Some(32632),
        }
    }

    #[test]
    fn test_parse_info_with_stac_epsg() {
        let json: Value = serde_json::from_str(
            r#"{
                "size": [10980, 10980],
                "geoTransform": [600000.0, 10.0, 0.0, 5100000.0, 0.0, -10.0],
                "bands": [{"band": 1}, {"band": 2}, {"band": 3}, {"band": 4}],
                "stac": {"proj:epsg": 32632}
            }"#,
        )
        .unwrap();
        let info = parse_info("SENTINEL2_L2A:x:10m:EPSG_32632", &json).unwrap();
        assert_eq!(info.width, 10980);
        assert_eq!(info.band_count, 4);
        assert_eq!(info.epsg, Some(32632));
        assert_eq!(info.transform.0[5], -10.0);
    }

    #[test]
    fn test_parse_info_epsg_from_wkt() {
        let json: Value = serde_json::from_str(
            r#"{
                "size": [3, 2],
                "bands": [{"band": 1}],
                "coordinateSystem": {"wkt": "PROJCRS[\"WGS 84 / Pseudo-Mercator\",ID[\"EPSG\",3857]]"}
            }"#,
        )
        .unwrap();
        let info = parse_info("vv.tif", &json).unwrap();
        assert_eq!(info.epsg, Some(3857));
    }

    #[test]
    fn test_parse_info_missing_size() {
        let json: Value = serde_json::from_str(r#"{"bands": []}"#).unwrap();
        assert!(matches!(parse_info("x", &json), Err(RasterError::Parse(_))));
    }

    #[test]
    fn test_subdataset_name() {
        let json: Value = serde_json::from_str(
            r#"{"metadata": {"SUBDATASETS": {
                "SUBDATASET_1_NAME": "SENTINEL2_L2A:/p/MTD_MSIL2A.xml:10m:EPSG_32632",
                "SUBDATASET_4_NAME": "SENTINEL2_L2A:/p/MTD_MSIL2A.xml:TCI:EPSG_32632"
            }}}"#,
        )
        .unwrap();
        assert_eq!(
            subdataset_name(&json, 3).as_deref(),
            Some("SENTINEL2_L2A:/p/MTD_MSIL2A.xml:TCI:EPSG_32632")
        );
        assert!(subdataset_name(&json, 1).is_none());
    }

    #[test]
    fn test_split_float_bands() {
        let mut bytes = Vec::new();
        for v in [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        let bands = split_float_bands(&bytes, 2, 3, 1, false).unwrap();
        assert_eq!(bands.len(), 2);
        assert_eq!(bands[1].data, vec![4.0, 5.0, 6.0]);
        assert!(split_float_bands(&bytes, 3, 3, 1, false).is_err());
    }

    #[test]
    fn test_envi_byte_order() {
        assert!(envi_is_big_endian("ENVI\nbyte order = 1\n"));
        assert!(!envi_is_big_endian("ENVI\nbyte order = 0\n"));
    }

    #[test]
    fn test_raw_vrt_layout() {
        let vrt = raw_vrt(
            &profile(),
            &RawLayout {
                file: "image.bin",
                data_type: "Byte",
                sample_size: 1,
                band_count: 3,
                nodata: None,
            },
            Some("mask.bin"),
        );
        assert!(vrt.contains("rasterXSize=\"4\" rasterYSize=\"2\""));
        assert!(vrt.contains("<SRS>EPSG:32632</SRS>"));
        assert!(vrt.contains("<ImageOffset>16</ImageOffset>"));
        assert!(vrt.contains("<LineOffset>4</LineOffset>"));
        assert!(vrt.contains("<MaskBand>"));
        assert_eq!(vrt.matches("<VRTRasterBand").count(), 4);
    }

    #[test]
    fn test_source_vrt_escapes_path() {
        let vrt = source_vrt(&profile(), Path::new("/out/a&b.tif"), 1, "mask.bin");
        assert!(vrt.contains("/out/a&amp;b.tif"));
        assert!(vrt.contains("<SourceBand>1</SourceBand>"));
    }

    #[test]
    fn test_mask_bytes() {
        let mask = ByteBand {
            width: 3,
            height: 1,
            data: vec![0, 1, 1],
        };
        assert_eq!(mask_bytes(&mask), vec![0, 255, 255]);
    }

    #[tokio::test]
    async fn test_missing_tool_reported() {
        let config = RasterConfig {
            gdalinfo_path: PathBuf::from("/nonexistent/gdalinfo"),
            ..RasterConfig::default()
        };
        let backend = GdalCliBackend::new(config);
        let err = backend.open(Path::new("/tmp/x.tif")).await.unwrap_err();
        assert!(matches!(err, RasterError::ToolNotFound { .. }));
    }
}
