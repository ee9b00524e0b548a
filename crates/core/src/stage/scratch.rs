//! Per-(run, product) scratch space for shared stage inputs.

use std::path::{Path, PathBuf};

use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::raster::projection::WEB_MERCATOR;
use crate::raster::{DatasetInfo, Polarization, RasterBackend, RasterError, SubdatasetRef};

/// Lazily prepared inputs shared by several stages of one product.
///
/// Lives at `<root>/<run id>/<product id>` so concurrent products and runs
/// never share files.
pub struct ScratchArea {
    dir: PathBuf,
    vv: OnceCell<DatasetInfo>,
    vh: OnceCell<DatasetInfo>,
}

impl ScratchArea {
    pub fn new(root: &Path, run_id: &str, product_id: &str) -> Self {
        Self {
            dir: root.join(run_id).join(product_id),
            vv: OnceCell::new(),
            vh: OnceCell::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Calibrated amplitude of `pol`, reprojected to web mercator.
    ///
    /// Prepared at most once; later callers get the cached dataset.
    pub async fn amplitude(
        &self,
        pol: Polarization,
        backend: &dyn RasterBackend,
        manifest: &Path,
    ) -> Result<&DatasetInfo, RasterError> {
        let cell = match pol {
            Polarization::Vv => &self.vv,
            Polarization::Vh => &self.vh,
        };
        cell.get_or_try_init(|| async {
            tokio::fs::create_dir_all(&self.dir).await?;
            let source = backend
                .open_subdataset(manifest, SubdatasetRef::Amplitude(pol))
                .await?;
            let dest = self
                .dir
                .join(format!("{}.tif", pol.as_str().to_ascii_lowercase()));
            debug!(polarization = %pol, dest = %dest.display(), "Preparing amplitude");
            backend.reproject(&source, WEB_MERCATOR, &dest, false).await
        })
        .await
    }

    /// Number of polarizations prepared so far.
    pub fn prepared_count(&self) -> usize {
        usize::from(self.vv.initialized()) + usize::from(self.vh.initialized())
    }

    /// Remove this product's scratch directory and, if empty, the run's.
    pub async fn cleanup(&self) {
        match tokio::fs::remove_dir_all(&self.dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(dir = %self.dir.display(), error = %e, "Failed to remove scratch"),
        }
        if let Some(run_dir) = self.dir.parent() {
            // Fails while sibling products still hold scratch; that is fine.
            let _ = tokio::fs::remove_dir(run_dir).await;
        }
    }
}
