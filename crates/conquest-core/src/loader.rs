use std::collections::{BTreeMap, BTreeSet};

use conquest_protocol::{Position, RegionId};
use serde::Deserialize;
use thiserror::Error;

use crate::map::{MapGraph, RegionDef};

#[derive(Debug, Error)]
pub enum MapError {
    #[error("yaml parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("utf-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("region {region} lists unknown neighbor {neighbor}")]
    UnknownNeighbor { region: String, neighbor: String },
    #[error("region {0} lists itself as a neighbor")]
    SelfNeighbor(String),
    #[error("map has no regions")]
    Empty,
}

pub enum MapSource<'a> {
    /// The bundled 25-province map.
    Embedded,
    Path(String),
    Bytes(&'a [u8]),
}

#[derive(Debug, Deserialize)]
struct RawMap {
    regions: BTreeMap<String, RawRegion>,
}

#[derive(Debug, Deserialize)]
struct RawRegion {
    name: Option<String>,
    native_name: Option<String>,
    pos: (i32, i32),
    #[serde(default)]
    strategic_value: u32,
    #[serde(default = "default_resource")]
    resource: String,
    #[serde(default)]
    population: u32,
    #[serde(default)]
    neighbors: Vec<String>,
}

fn default_resource() -> String {
    "none".to_string()
}

pub fn load_map(source: MapSource<'_>) -> Result<MapGraph, MapError> {
    let raw: RawMap = match source {
        MapSource::Embedded => {
            serde_yaml::from_str(include_str!("../data/provinces.yaml"))?
        }
        MapSource::Path(path) => serde_yaml::from_str(&std::fs::read_to_string(path)?)?,
        MapSource::Bytes(bytes) => serde_yaml::from_str(std::str::from_utf8(bytes)?)?,
    };
    compile(raw)
}

fn compile(raw: RawMap) -> Result<MapGraph, MapError> {
    if raw.regions.is_empty() {
        return Err(MapError::Empty);
    }

    let mut declared: BTreeSet<(String, String)> = BTreeSet::new();
    for (id, region) in &raw.regions {
        for neighbor in &region.neighbors {
            if neighbor == id {
                return Err(MapError::SelfNeighbor(id.clone()));
            }
            if !raw.regions.contains_key(neighbor) {
                return Err(MapError::UnknownNeighbor {
                    region: id.clone(),
                    neighbor: neighbor.clone(),
                });
            }
            declared.insert((id.clone(), neighbor.clone()));
        }
    }

    let asymmetric = declared
        .iter()
        .filter(|(a, b)| !declared.contains(&(b.clone(), a.clone())))
        .map(|(a, b)| (RegionId::new(a.as_str()), RegionId::new(b.as_str())))
        .collect();

    let links: Vec<(RegionId, RegionId)> = declared
        .iter()
        .map(|(a, b)| (RegionId::new(a.as_str()), RegionId::new(b.as_str())))
        .collect();

    let regions = raw
        .regions
        .into_iter()
        .map(|(id, r)| {
            let region_id = RegionId::new(id.as_str());
            let def = RegionDef {
                id: region_id.clone(),
                name: r.name.unwrap_or(id),
                native_name: r.native_name,
                position: Position::new(r.pos.0, r.pos.1),
                strategic_value: r.strategic_value,
                resource: r.resource,
                population: r.population,
            };
            (region_id, def)
        })
        .collect();

    Ok(MapGraph::from_parts(regions, links, asymmetric))
}
