//! STAC (SpatioTemporal Asset Catalog) data types.
//!
//! Serde models for STAC Item Search (`POST /search`) bodies and responses:
//! point intersection, datetime range, the query extension, pagination via
//! `links`, and asset access.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Search request
// ---------------------------------------------------------------------------

/// Body for `POST /search` (STAC API – Item Search).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StacSearchParams {
    /// GeoJSON geometry the items must intersect.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intersects: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub datetime: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub collections: Option<Vec<String>>,

    /// Query extension: `{ "prop": { "lt": 10 } }`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<Map<String, Value>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,

    /// Pagination token (next page).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl StacSearchParams {
    /// Create empty search params.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to items whose footprint contains a WGS84 point.
    pub fn intersects_point(mut self, lon: f64, lat: f64) -> Self {
        self.intersects = Some(json!({ "type": "Point", "coordinates": [lon, lat] }));
        self
    }

    /// Set datetime or datetime range (e.g. `"2024-06-01/2024-06-30"`).
    pub fn datetime(mut self, dt: &str) -> Self {
        self.datetime = Some(dt.to_string());
        self
    }

    /// Set collection filter.
    pub fn collections(mut self, cols: &[&str]) -> Self {
        self.collections = Some(cols.iter().map(|s| s.to_string()).collect());
        self
    }

    /// Add a `prop < value` condition.
    pub fn query_lt(self, prop: &str, value: impl Into<Value>) -> Self {
        self.query_op(prop, "lt", value.into())
    }

    /// Add a `prop == value` condition.
    pub fn query_eq(self, prop: &str, value: impl Into<Value>) -> Self {
        self.query_op(prop, "eq", value.into())
    }

    fn query_op(mut self, prop: &str, op: &str, value: Value) -> Self {
        let query = self.query.get_or_insert_with(Map::new);
        let entry = query
            .entry(prop.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(ops) = entry {
            ops.insert(op.to_string(), value);
        }
        self
    }

    /// Set maximum items per page.
    pub fn limit(mut self, n: u32) -> Self {
        self.limit = Some(n);
        self
    }

    /// Set pagination token.
    pub fn token(mut self, tok: &str) -> Self {
        self.token = Some(tok.to_string());
        self
    }
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// A STAC Item Collection (GeoJSON FeatureCollection).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StacItemCollection {
    #[serde(rename = "type")]
    pub type_: String,

    pub features: Vec<StacItem>,

    #[serde(default)]
    pub links: Vec<StacLink>,

    #[serde(rename = "numberMatched", skip_serializing_if = "Option::is_none")]
    pub number_matched: Option<u64>,

    #[serde(rename = "numberReturned", skip_serializing_if = "Option::is_none")]
    pub number_returned: Option<u64>,

    /// Earth Search v0 reports counts in `context` instead.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

impl StacItemCollection {
    /// Find the `"next"` pagination link, if any.
    pub fn next_link(&self) -> Option<&StacLink> {
        self.links.iter().find(|l| l.rel == "next")
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// A single STAC Item (GeoJSON Feature).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StacItem {
    #[serde(rename = "type")]
    pub type_: String,

    pub id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Value>,

    /// Bounding box `[west, south, east, north]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Vec<f64>>,

    pub properties: StacItemProperties,

    #[serde(default)]
    pub assets: HashMap<String, StacAsset>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,

    #[serde(default)]
    pub links: Vec<StacLink>,
}

impl StacItem {
    /// EPSG code from the `proj:epsg` property, if available.
    pub fn epsg(&self) -> Option<u32> {
        self.properties
            .extra
            .get("proj:epsg")
            .and_then(Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
    }

    /// Numeric value of an arbitrary property.
    pub fn property_f64(&self, name: &str) -> Option<f64> {
        match name {
            "eo:cloud_cover" => self.properties.eo_cloud_cover,
            _ => self.properties.extra.get(name).and_then(Value::as_f64),
        }
    }
}

/// STAC Item properties.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StacItemProperties {
    /// ISO 8601 datetime.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datetime: Option<String>,

    /// Cloud cover percentage (EO extension).
    #[serde(rename = "eo:cloud_cover", skip_serializing_if = "Option::is_none")]
    pub eo_cloud_cover: Option<f64>,

    /// Platform name (e.g., "sentinel-2a").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub gsd: Option<f64>,

    /// All other properties we don't model explicitly.
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// A single STAC Asset (file reference).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StacAsset {
    /// URL to the asset file.
    pub href: String,

    /// Media type (e.g., `"image/tiff; application=geotiff; profile=cloud-optimized"`).
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Roles: `["data"]`, `["thumbnail"]`, `["overview"]`, etc.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,

    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// A STAC Link (used for pagination and related resources).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StacLink {
    /// Relationship: `"self"`, `"root"`, `"next"`, `"prev"`, etc.
    pub rel: String,

    pub href: String,

    /// HTTP method for the link (default GET, but `"next"` often uses POST).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    /// Request body for POST-based pagination.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,

    /// If true, merge `body` into the previous request body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merge: Option<bool>,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // Trimmed Earth Search v0 response.
    const FIXTURE: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    {
      "type": "Feature",
      "id": "S2B_30TVK_20200712_0_L2A",
      "geometry": {
        "type": "Polygon",
        "coordinates": [[[-3.95, 40.22], [-2.84, 40.22], [-2.84, 41.21], [-3.95, 41.21], [-3.95, 40.22]]]
      },
      "bbox": [-3.95, 40.22, -2.84, 41.21],
      "properties": {
        "datetime": "2020-07-12T11:06:47Z",
        "eo:cloud_cover": 0.43,
        "sentinel:valid_cloud_cover": true,
        "platform": "sentinel-2b",
        "gsd": 10,
        "proj:epsg": 32630
      },
      "assets": {
        "B04": {
          "href": "https://sentinel-cogs.s3.us-west-2.amazonaws.com/sentinel-s2-l2a-cogs/30/T/VK/2020/7/S2B_30TVK_20200712_0_L2A/B04.tif",
          "type": "image/tiff; application=geotiff; profile=cloud-optimized",
          "title": "Band 4 (red)",
          "roles": ["data"]
        },
        "B08": {
          "href": "https://sentinel-cogs.s3.us-west-2.amazonaws.com/sentinel-s2-l2a-cogs/30/T/VK/2020/7/S2B_30TVK_20200712_0_L2A/B08.tif",
          "type": "image/tiff; application=geotiff; profile=cloud-optimized",
          "title": "Band 8 (nir)"
        },
        "thumbnail": {
          "href": "https://roda.sentinel-hub.com/sentinel-s2-l1c/tiles/30/T/VK/2020/7/12/0/preview.jpg",
          "type": "image/png",
          "roles": ["thumbnail"]
        }
      },
      "collection": "sentinel-s2-l2a-cogs",
      "links": []
    }
  ],
  "links": [
    {
      "rel": "next",
      "href": "https://earth-search.aws.element84.com/v0/search",
      "method": "POST",
      "body": {"page": 2},
      "merge": true
    }
  ],
  "context": {"page": 1, "limit": 1, "matched": 3, "returned": 1}
}"#;

    fn fixture() -> StacItemCollection {
        serde_json::from_str(FIXTURE).unwrap()
    }

    #[test]
    fn parse_item_collection() {
        let col = fixture();
        assert_eq!(col.type_, "FeatureCollection");
        assert_eq!(col.len(), 1);
        assert!(col.number_matched.is_none());
        assert_eq!(col.context.as_ref().unwrap()["matched"], 3);
    }

    #[test]
    fn parse_properties() {
        let item = &fixture().features[0];
        assert_eq!(item.id, "S2B_30TVK_20200712_0_L2A");
        assert_eq!(item.properties.datetime.as_deref(), Some("2020-07-12T11:06:47Z"));
        assert_eq!(item.property_f64("eo:cloud_cover"), Some(0.43));
        assert_eq!(item.properties.extra["sentinel:valid_cloud_cover"], true);
        assert_eq!(item.epsg(), Some(32630));
        assert!(item.property_f64("missing").is_none());
    }

    #[test]
    fn asset_hrefs() {
        let item = &fixture().features[0];
        assert!(item.assets["B04"].href.ends_with("/B04.tif"));
        assert!(item.assets["B08"].href.ends_with("/B08.tif"));
        assert!(!item.assets.contains_key("B02"));
        assert!(item.assets.contains_key("thumbnail"));
    }

    #[test]
    fn pagination_links() {
        let col = fixture();
        let next = col.next_link().unwrap();
        assert_eq!(next.method.as_deref(), Some("POST"));
        assert_eq!(next.body.as_ref().unwrap()["page"], 2);
        assert_eq!(next.merge, Some(true));
    }

    #[test]
    fn builder_serializes_search_body() {
        let params = StacSearchParams::new()
            .collections(&["sentinel-s2-l2a-cogs"])
            .intersects_point(-3.7037, 40.4168)
            .datetime("2020-07-01T00:00:00Z/2020-07-31T00:00:00Z")
            .query_lt("eo:cloud_cover", 10)
            .query_eq("sentinel:valid_cloud_cover", true)
            .limit(100);

        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["collections"], json!(["sentinel-s2-l2a-cogs"]));
        assert_eq!(
            json["intersects"],
            json!({"type": "Point", "coordinates": [-3.7037, 40.4168]})
        );
        assert_eq!(json["query"]["eo:cloud_cover"], json!({"lt": 10}));
        assert_eq!(json["query"]["sentinel:valid_cloud_cover"], json!({"eq": true}));
        assert_eq!(json["limit"], 100);
        assert!(json.get("bbox").is_none());
        assert!(json.get("token").is_none());
    }

    #[test]
    fn query_ops_on_same_property_merge() {
        let params = StacSearchParams::new()
            .query_lt("eo:cloud_cover", 20)
            .query_eq("eo:cloud_cover", 5);
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["query"]["eo:cloud_cover"], json!({"lt": 20, "eq": 5}));
    }

    #[test]
    fn empty_params_has_no_fields() {
        let json = serde_json::to_value(StacSearchParams::new()).unwrap();
        assert!(json.as_object().unwrap().is_empty());
    }
}
