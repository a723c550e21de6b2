//! Least-cloudy scene search over a STAC catalog
//!
//! A search asks for items of one collection that intersect the point of
//! interest, fall in the date range and report a cloud cover strictly below
//! the ceiling. Every result page is read, then the scene with the smallest
//! cloud cover wins; on ties the first item returned by the catalog is kept.

use chrono::NaiveDate;
use s2cluster_cloud::blocking::StacClientBlocking;
use s2cluster_cloud::{
    CloudError, StacCatalog, StacClientOptions, StacItem, StacItemCollection, StacLink,
    StacSearchParams,
};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::request::SearchQuery;
use crate::scene::Scene;

/// Items requested per page.
const PAGE_LIMIT: u32 = 100;

/// Collection and property names of one STAC endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogProfile {
    pub catalog: StacCatalog,
    pub collection: String,
    pub cloud_property: String,
    /// Boolean property that must be `true`, when the catalog publishes one
    pub validity_property: Option<String>,
}

impl CatalogProfile {
    /// Earth Search v0, `sentinel-s2-l2a-cogs`.
    pub fn earth_search_v0() -> Self {
        Self {
            catalog: StacCatalog::EarthSearchV0,
            collection: "sentinel-s2-l2a-cogs".into(),
            cloud_property: "eo:cloud_cover".into(),
            validity_property: Some("sentinel:valid_cloud_cover".into()),
        }
    }

    /// Earth Search v1, `sentinel-2-l2a`. No validity flag.
    pub fn earth_search_v1() -> Self {
        Self {
            catalog: StacCatalog::EarthSearch,
            collection: "sentinel-2-l2a".into(),
            cloud_property: "eo:cloud_cover".into(),
            validity_property: None,
        }
    }

    /// Any STAC API serving the v0 collection and property names.
    pub fn custom(url: &str) -> Self {
        Self {
            catalog: StacCatalog::Custom(url.to_string()),
            ..Self::earth_search_v0()
        }
    }

    /// Profile from a CLI-style name: `v0`, `v1` (and their aliases) or a URL.
    pub fn from_str_or_url(s: &str) -> Self {
        match StacCatalog::from_str_or_url(s) {
            StacCatalog::EarthSearchV0 => Self::earth_search_v0(),
            StacCatalog::EarthSearch => Self::earth_search_v1(),
            StacCatalog::Custom(url) => Self::custom(&url),
        }
    }
}

impl Default for CatalogProfile {
    fn default() -> Self {
        Self::earth_search_v0()
    }
}

/// Search body for one point and date range.
///
/// The range is sent as `{start}T00:00:00Z/{end}T23:59:59Z`, so the end day
/// is included.
pub fn search_params(
    profile: &CatalogProfile,
    (lon, lat): (f64, f64),
    (start, end): (NaiveDate, NaiveDate),
    max_cloud: f64,
) -> StacSearchParams {
    let mut params = StacSearchParams::new()
        .collections(&[profile.collection.as_str()])
        .intersects_point(lon, lat)
        .datetime(&format!("{start}T00:00:00Z/{end}T23:59:59Z"))
        .query_lt(&profile.cloud_property, max_cloud)
        .limit(PAGE_LIMIT);
    if let Some(flag) = &profile.validity_property {
        params = params.query_eq(flag, true);
    }
    params
}

/// Scene with the lowest cloud cover, first-returned on ties.
pub fn select_least_cloudy(items: &[StacItem], cloud_property: &str) -> Option<Scene> {
    items
        .iter()
        .filter_map(|item| Scene::from_item(item, cloud_property))
        .fold(None, |best: Option<Scene>, scene| match best {
            Some(b) if b.cloud_cover <= scene.cloud_cover => Some(b),
            _ => Some(scene),
        })
}

/// Paged source of catalog items.
pub trait SceneCatalog {
    /// First page of items matching `params`.
    fn search(&self, params: &StacSearchParams) -> std::result::Result<StacItemCollection, CloudError>;

    /// Page behind the `next` link of a previous page.
    fn next_page(
        &self,
        link: &StacLink,
        params: &StacSearchParams,
    ) -> std::result::Result<StacItemCollection, CloudError>;
}

/// [`SceneCatalog`] backed by a live STAC API.
pub struct StacSceneCatalog {
    client: StacClientBlocking,
}

impl StacSceneCatalog {
    pub fn new(profile: &CatalogProfile, options: StacClientOptions) -> Result<Self> {
        let client = StacClientBlocking::new(profile.catalog.clone(), options)?;
        Ok(Self { client })
    }
}

impl SceneCatalog for StacSceneCatalog {
    fn search(&self, params: &StacSearchParams) -> std::result::Result<StacItemCollection, CloudError> {
        self.client.search(params)
    }

    fn next_page(
        &self,
        link: &StacLink,
        params: &StacSearchParams,
    ) -> std::result::Result<StacItemCollection, CloudError> {
        self.client.next_page(link, params)
    }
}

/// Least-cloudy lookup against one catalog.
pub struct CatalogSearch<C> {
    catalog: C,
    profile: CatalogProfile,
}

impl<C: SceneCatalog> CatalogSearch<C> {
    pub fn new(catalog: C, profile: CatalogProfile) -> Self {
        Self { catalog, profile }
    }

    pub fn profile(&self) -> &CatalogProfile {
        &self.profile
    }

    /// Least-cloudy scene among every matching item, `Ok(None)` when
    /// nothing matches.
    pub fn find_scene(&self, query: &SearchQuery) -> Result<Option<Scene>> {
        let params = search_params(
            &self.profile,
            (query.lon, query.lat),
            (query.start, query.end),
            query.max_cloud,
        );
        debug!(
            collection = %self.profile.collection,
            datetime = ?params.datetime,
            "searching catalog"
        );
        let items = self.all_items(&params)?;
        let scene = select_least_cloudy(&items, &self.profile.cloud_property);
        match &scene {
            Some(s) => info!(
                "Selected scene {} ({:.2}% cloud) from {} candidates",
                s.id,
                s.cloud_cover,
                items.len()
            ),
            None => info!("No scene matched the search"),
        }
        Ok(scene)
    }

    /// Follow `next` links until the catalog stops returning them.
    ///
    /// Stops early on an empty page or a link identical to the one just
    /// followed, which would otherwise repeat forever.
    fn all_items(&self, params: &StacSearchParams) -> Result<Vec<StacItem>> {
        let mut page = self.catalog.search(params)?;
        let mut items = Vec::new();
        let mut pages = 1usize;
        let mut followed: Option<StacLink> = None;

        loop {
            let next = page.next_link().cloned();
            let empty = page.features.is_empty();
            items.append(&mut page.features);

            let Some(link) = next else { break };
            let repeated = followed
                .as_ref()
                .is_some_and(|prev| prev.href == link.href && prev.body == link.body);
            if empty || repeated {
                warn!(pages, href = %link.href, "catalog pagination stopped on a stale next link");
                break;
            }

            page = self.catalog.next_page(&link, params)?;
            pages += 1;
            followed = Some(link);
        }

        debug!(pages, items = items.len(), "catalog search complete");
        Ok(items)
    }
}
