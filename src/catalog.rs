//! Layer catalog and projection metadata for the GIBS imagery service
//!
//! The catalog holds static descriptors for known GIBS layers (name,
//! mission start date, tile format, native resolution) and the supported
//! map projections with their extents and service endpoints. It also
//! renders the `GDAL_WMS` service description consumed by the external
//! translator tool.

use crate::error::{DatagenError, Result};
use crate::grid::{Resolution, TileGrid};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

/// Base URL of the GIBS WMTS endpoints
pub const GIBS_BASE_URL: &str = "https://gibs.earthdata.nasa.gov/wmts";

/// Rectangular window in projection units, y-down from the upper-left corner
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub ulx: f64,
    pub uly: f64,
    pub lrx: f64,
    pub lry: f64,
}

/// Supported map projections, identified by EPSG code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Projection {
    /// Geographic lat/lon
    #[serde(rename = "EPSG:4326")]
    Geographic,
    /// NSIDC Sea Ice Polar Stereographic North
    #[serde(rename = "EPSG:3413")]
    Arctic,
    /// Antarctic Polar Stereographic
    #[serde(rename = "EPSG:3031")]
    Antarctic,
    /// Web Mercator
    #[serde(rename = "EPSG:3857")]
    WebMercator,
}

impl Projection {
    /// Numeric EPSG code
    pub fn epsg_code(&self) -> u32 {
        match self {
            Self::Geographic => 4326,
            Self::Arctic => 3413,
            Self::Antarctic => 3031,
            Self::WebMercator => 3857,
        }
    }

    /// URL path segment of the GIBS endpoint serving this projection
    pub fn endpoint_path(&self) -> &'static str {
        match self {
            Self::Geographic => "epsg4326",
            Self::Arctic => "epsg3413",
            Self::Antarctic => "epsg3031",
            Self::WebMercator => "epsg3857",
        }
    }

    /// True geographic extent of the projection, in projection units
    pub fn extent(&self) -> Extent {
        match self {
            Self::Geographic => Extent {
                ulx: -180.0,
                uly: 90.0,
                lrx: 180.0,
                lry: -90.0,
            },
            Self::Arctic | Self::Antarctic => Extent {
                ulx: -4_194_304.0,
                uly: 4_194_304.0,
                lrx: 4_194_304.0,
                lry: -4_194_304.0,
            },
            Self::WebMercator => Extent {
                ulx: -20_037_508.342_789_25,
                uly: 20_037_508.342_789_25,
                lrx: 20_037_508.342_789_25,
                lry: -20_037_508.342_789_25,
            },
        }
    }

    /// Tile-grid origin window declared in the `GDAL_WMS` description.
    ///
    /// GIBS pads the geographic grid so that the top tile level is an
    /// even 2x1 count; the padded window (out to 396/-198) is the one
    /// the service description must declare, while actual reads are
    /// clipped to `extent()` via `-projwin`.
    pub fn data_window(&self) -> (Extent, u32, u32) {
        match self {
            Self::Geographic => (
                Extent {
                    ulx: -180.0,
                    uly: 90.0,
                    lrx: 396.0,
                    lry: -198.0,
                },
                2,
                1,
            ),
            Self::Arctic | Self::Antarctic => (self.extent(), 2, 2),
            Self::WebMercator => (self.extent(), 1, 1),
        }
    }

    /// All supported projections
    pub fn all() -> [Projection; 4] {
        [
            Self::Geographic,
            Self::Arctic,
            Self::Antarctic,
            Self::WebMercator,
        ]
    }
}

impl std::fmt::Display for Projection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EPSG:{}", self.epsg_code())
    }
}

impl FromStr for Projection {
    type Err = DatagenError;

    /// Accepts `"4326"` as well as `"EPSG:4326"` (case-insensitive)
    fn from_str(s: &str) -> Result<Self> {
        let code = s
            .trim()
            .to_ascii_lowercase()
            .trim_start_matches("epsg:")
            .to_string();
        match code.as_str() {
            "4326" => Ok(Self::Geographic),
            "3413" => Ok(Self::Arctic),
            "3031" => Ok(Self::Antarctic),
            "3857" => Ok(Self::WebMercator),
            _ => Err(DatagenError::catalog(format!(
                "Unsupported projection '{}'. Supported: EPSG:4326, EPSG:3413, EPSG:3031, EPSG:3857",
                s
            ))),
        }
    }
}

/// Pixel format of the tiles a layer serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TileFormat {
    Jpeg,
    Png,
}

impl TileFormat {
    /// File extension used in tile request URLs
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }

    /// Band count declared in the service description (PNG carries alpha)
    pub fn bands(&self) -> u8 {
        match self {
            Self::Jpeg => 3,
            Self::Png => 4,
        }
    }
}

/// Static descriptor for one GIBS imagery layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    /// GIBS layer identifier, e.g. `MODIS_Terra_CorrectedReflectance_TrueColor`
    pub name: String,
    /// Human-readable title
    pub title: String,
    /// First date for which imagery exists
    pub start_date: NaiveDate,
    /// Tile pixel format
    pub format: TileFormat,
    /// Finest resolution the layer is served at
    pub native_resolution: Resolution,
}

impl Layer {
    /// Whether imagery exists for `date`
    pub fn available_on(&self, date: NaiveDate) -> bool {
        date >= self.start_date
    }
}

fn d(year: i32, month: u32, day: u32) -> NaiveDate {
    // Builtin catalog dates are literals; a failure here is a programming error.
    NaiveDate::from_ymd_opt(year, month, day).expect("valid builtin catalog date")
}

fn builtin_layers() -> Vec<Layer> {
    vec![
        Layer {
            name: "MODIS_Terra_CorrectedReflectance_TrueColor".into(),
            title: "MODIS Terra Corrected Reflectance (True Color)".into(),
            start_date: d(2000, 2, 24),
            format: TileFormat::Jpeg,
            native_resolution: Resolution::R250m,
        },
        Layer {
            name: "MODIS_Terra_CorrectedReflectance_Bands367".into(),
            title: "MODIS Terra Corrected Reflectance (Bands 3-6-7)".into(),
            start_date: d(2000, 2, 24),
            format: TileFormat::Jpeg,
            native_resolution: Resolution::R250m,
        },
        Layer {
            name: "MODIS_Terra_CorrectedReflectance_Bands721".into(),
            title: "MODIS Terra Corrected Reflectance (Bands 7-2-1)".into(),
            start_date: d(2000, 2, 24),
            format: TileFormat::Jpeg,
            native_resolution: Resolution::R250m,
        },
        Layer {
            name: "MODIS_Aqua_CorrectedReflectance_TrueColor".into(),
            title: "MODIS Aqua Corrected Reflectance (True Color)".into(),
            start_date: d(2002, 7, 4),
            format: TileFormat::Jpeg,
            native_resolution: Resolution::R250m,
        },
        Layer {
            name: "MODIS_Aqua_CorrectedReflectance_Bands721".into(),
            title: "MODIS Aqua Corrected Reflectance (Bands 7-2-1)".into(),
            start_date: d(2002, 7, 4),
            format: TileFormat::Jpeg,
            native_resolution: Resolution::R250m,
        },
        Layer {
            name: "VIIRS_SNPP_CorrectedReflectance_TrueColor".into(),
            title: "VIIRS SNPP Corrected Reflectance (True Color)".into(),
            start_date: d(2015, 11, 24),
            format: TileFormat::Jpeg,
            native_resolution: Resolution::R250m,
        },
        Layer {
            name: "VIIRS_NOAA20_CorrectedReflectance_TrueColor".into(),
            title: "VIIRS NOAA-20 Corrected Reflectance (True Color)".into(),
            start_date: d(2018, 1, 1),
            format: TileFormat::Jpeg,
            native_resolution: Resolution::R250m,
        },
        Layer {
            name: "MODIS_Terra_Snow_Cover".into(),
            title: "MODIS Terra Snow Cover (Normalized Difference Snow Index)".into(),
            start_date: d(2000, 2, 24),
            format: TileFormat::Png,
            native_resolution: Resolution::R500m,
        },
    ]
}

/// Catalog of known layers: the builtin set, optionally extended from
/// user-supplied JSON files
#[derive(Debug, Clone)]
pub struct LayerCatalog {
    layers: BTreeMap<String, Layer>,
}

impl LayerCatalog {
    /// Create a catalog holding the builtin GIBS layers
    pub fn builtin() -> Self {
        let layers = builtin_layers()
            .into_iter()
            .map(|l| (l.name.clone(), l))
            .collect();
        Self { layers }
    }

    /// Create an empty catalog
    pub fn empty() -> Self {
        Self {
            layers: BTreeMap::new(),
        }
    }

    /// Look up a layer by name
    ///
    /// # Errors
    /// - Unknown layer name
    pub fn get(&self, name: &str) -> Result<&Layer> {
        self.layers.get(name).ok_or_else(|| {
            DatagenError::catalog(format!(
                "Unknown layer '{}'. Run the 'layers' subcommand to list known layers.",
                name
            ))
        })
    }

    /// All layers, sorted by name
    pub fn layers(&self) -> impl Iterator<Item = &Layer> {
        self.layers.values()
    }

    /// Number of layers in the catalog
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Whether the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Insert or replace a layer descriptor
    pub fn insert(&mut self, layer: Layer) {
        self.layers.insert(layer.name.clone(), layer);
    }

    /// Merge layer descriptors from a JSON file (an array of layers).
    /// Entries with a name already present replace the builtin one.
    ///
    /// # Errors
    /// - File cannot be read
    /// - File is not a JSON array of layer descriptors
    pub fn merge_file<P: AsRef<Path>>(&mut self, path: P) -> Result<usize> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| DatagenError::file_io_error("read layer catalog", path, &e))?;
        let extra: Vec<Layer> = serde_json::from_str(&content).map_err(|e| {
            DatagenError::catalog(format!(
                "Invalid layer catalog '{}': {}",
                path.display(),
                e
            ))
        })?;
        let count = extra.len();
        for layer in extra {
            log::debug!("catalog: merged layer '{}'", layer.name);
            self.insert(layer);
        }
        Ok(count)
    }
}

impl Default for LayerCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Render the `GDAL_WMS` service description for one (layer, projection,
/// resolution, date) combination.
///
/// The output is the XML document handed to the external translator
/// tool; rendering is deterministic for fixed inputs.
pub fn wms_xml(
    layer: &Layer,
    projection: Projection,
    resolution: Resolution,
    date: NaiveDate,
) -> String {
    let grid = TileGrid::for_resolution(projection, resolution);
    let (window, tile_count_x, tile_count_y) = projection.data_window();
    let server_url = format!(
        "{base}/{endpoint}/best/{layer}/default/{date}/{tms}/${{z}}/${{y}}/${{x}}.{ext}",
        base = GIBS_BASE_URL,
        endpoint = projection.endpoint_path(),
        layer = layer.name,
        date = date.format("%Y-%m-%d"),
        tms = grid.tile_matrix_set(),
        ext = layer.format.extension(),
    );

    format!(
        "<GDAL_WMS>\n\
         \x20   <Service name=\"TMS\">\n\
         \x20       <ServerUrl>{server_url}</ServerUrl>\n\
         \x20   </Service>\n\
         \x20   <DataWindow>\n\
         \x20       <UpperLeftX>{ulx}</UpperLeftX>\n\
         \x20       <UpperLeftY>{uly}</UpperLeftY>\n\
         \x20       <LowerRightX>{lrx}</LowerRightX>\n\
         \x20       <LowerRightY>{lry}</LowerRightY>\n\
         \x20       <TileLevel>{level}</TileLevel>\n\
         \x20       <TileCountX>{tcx}</TileCountX>\n\
         \x20       <TileCountY>{tcy}</TileCountY>\n\
         \x20       <YOrigin>top</YOrigin>\n\
         \x20   </DataWindow>\n\
         \x20   <Projection>EPSG:{epsg}</Projection>\n\
         \x20   <BlockSizeX>{block}</BlockSizeX>\n\
         \x20   <BlockSizeY>{block}</BlockSizeY>\n\
         \x20   <BandsCount>{bands}</BandsCount>\n\
         </GDAL_WMS>\n",
        server_url = server_url,
        ulx = window.ulx,
        uly = window.uly,
        lrx = window.lrx,
        lry = window.lry,
        level = grid.level,
        tcx = tile_count_x,
        tcy = tile_count_y,
        epsg = projection.epsg_code(),
        block = grid.tile_size,
        bands = layer.format.bands(),
    )
}
