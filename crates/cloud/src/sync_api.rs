//! Blocking (synchronous) API.
//!
//! Wraps the async [`CogReader`](crate::cog_reader::CogReader) and
//! [`StacClient`](crate::stac_client::StacClient) with a current-thread Tokio
//! runtime so callers don't need to manage their own async runtime.

#[cfg(feature = "native")]
mod inner {
    use s2cluster_core::raster::{GeoTransform, PixelWindow, Raster, RasterElement};
    use s2cluster_core::CRS;

    use crate::cog_reader::{CogReader, CogReaderOptions};
    use crate::error::{CloudError, Result};
    use crate::stac_client::{StacCatalog, StacClient, StacClientOptions};
    use crate::stac_models::{StacItemCollection, StacLink, StacSearchParams};

    fn runtime() -> Result<tokio::runtime::Runtime> {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| CloudError::Network(format!("failed to start runtime: {e}")))
    }

    /// Blocking wrapper around [`CogReader`].
    pub struct CogReaderBlocking {
        rt: tokio::runtime::Runtime,
        inner: CogReader,
    }

    impl CogReaderBlocking {
        /// Open a remote COG (blocking).
        pub fn open(url: &str, options: CogReaderOptions) -> Result<Self> {
            let rt = runtime()?;
            let inner = rt.block_on(CogReader::open(url, options))?;
            Ok(Self { rt, inner })
        }

        /// Read a pixel window (blocking).
        pub fn read_window<T: RasterElement>(&mut self, window: &PixelWindow) -> Result<Raster<T>> {
            self.rt.block_on(self.inner.read_window(window))
        }

        pub fn size(&self) -> (usize, usize) {
            self.inner.size()
        }

        pub fn geo_transform(&self) -> Option<GeoTransform> {
            self.inner.geo_transform()
        }

        pub fn crs(&self) -> Option<CRS> {
            self.inner.crs()
        }
    }

    // ── STAC blocking wrappers ───────────────────────────────────────

    /// Blocking wrapper around [`StacClient`].
    pub struct StacClientBlocking {
        rt: tokio::runtime::Runtime,
        inner: StacClient,
    }

    impl StacClientBlocking {
        pub fn new(catalog: StacCatalog, options: StacClientOptions) -> Result<Self> {
            let rt = runtime()?;
            let inner = StacClient::new(catalog, options)?;
            Ok(Self { rt, inner })
        }

        pub fn catalog(&self) -> &StacCatalog {
            self.inner.catalog()
        }

        /// Execute a single search request (blocking).
        pub fn search(&self, params: &StacSearchParams) -> Result<StacItemCollection> {
            self.rt.block_on(self.inner.search(params))
        }

        /// Fetch the page behind a `next` link (blocking).
        pub fn next_page(
            &self,
            link: &StacLink,
            params: &StacSearchParams,
        ) -> Result<StacItemCollection> {
            self.rt.block_on(self.inner.next_page(link, params))
        }
    }
}

#[cfg(feature = "native")]
pub use inner::*;
