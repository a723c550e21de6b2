//! Scene value type built from a catalog item

use std::collections::BTreeMap;

use serde::Serialize;
use s2cluster_cloud::StacItem;

use crate::stack::Band;

/// One Sentinel-2 acquisition chosen from the catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scene {
    pub id: String,
    /// Cloud cover in percent
    pub cloud_cover: f64,
    pub datetime: Option<String>,
    /// EPSG code advertised by the catalog (`proj:epsg`)
    pub epsg: Option<u32>,
    /// Asset key → href
    pub assets: BTreeMap<String, String>,
}

impl Scene {
    /// Build a scene from a STAC item.
    ///
    /// Returns `None` when the item has no numeric `cloud_property`.
    pub fn from_item(item: &StacItem, cloud_property: &str) -> Option<Self> {
        let cloud_cover = item.property_f64(cloud_property)?;
        Some(Self {
            id: item.id.clone(),
            cloud_cover,
            datetime: item.properties.datetime.clone(),
            epsg: item.epsg(),
            assets: item
                .assets
                .iter()
                .map(|(k, a)| (k.clone(), a.href.clone()))
                .collect(),
        })
    }

    /// Href of a spectral band, under either its band-number or common-name key.
    pub fn band_href(&self, band: Band) -> Option<&str> {
        band.asset_keys()
            .iter()
            .find_map(|k| self.assets.get(*k))
            .map(String::as_str)
    }
}
