//! BAG entity kinds and their per-kind constants.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::BagError;

/// The BAG object types ingested by the pipeline.
///
/// Unit, Berth and Pitch are the three structural variants of the
/// address-bearing object; each still gets its own table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Woonplaats
    Place,
    /// GemeenteWoonplaatsRelatie
    PlaceMunicipality,
    /// OpenbareRuimte
    PublicSpace,
    /// Nummeraanduiding
    Number,
    /// Pand
    Building,
    /// Verblijfsobject
    Unit,
    /// Ligplaats
    Berth,
    /// Standplaats
    Pitch,
}

/// Where a kind's planar position comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionSource {
    /// A scalar `pos` field ("x y z"), dropped once converted
    Pos,
    /// The first point of the geometry ring
    Geometry,
}

/// Field name holding the scalar position text.
pub const POS_FIELD: &str = "pos";

/// Field name holding the geometry ring / GeoJSON.
pub const GEOMETRY_FIELD: &str = "geometry";

impl EntityKind {
    /// All kinds in ingest order. Reconciliation needs every one of them.
    pub fn all() -> &'static [EntityKind] {
        &[
            EntityKind::Place,
            EntityKind::PlaceMunicipality,
            EntityKind::PublicSpace,
            EntityKind::Number,
            EntityKind::Building,
            EntityKind::Unit,
            EntityKind::Berth,
            EntityKind::Pitch,
        ]
    }

    /// Stable snake_case name, used in config files and logs
    pub fn name(&self) -> &'static str {
        match self {
            EntityKind::Place => "place",
            EntityKind::PlaceMunicipality => "place_municipality",
            EntityKind::PublicSpace => "public_space",
            EntityKind::Number => "number",
            EntityKind::Building => "building",
            EntityKind::Unit => "unit",
            EntityKind::Berth => "berth",
            EntityKind::Pitch => "pitch",
        }
    }

    /// Local name of the XML element holding one object
    pub fn object_tag(&self) -> &'static str {
        match self {
            EntityKind::Place => "Woonplaats",
            EntityKind::PlaceMunicipality => "GemeenteWoonplaatsRelatie",
            EntityKind::PublicSpace => "OpenbareRuimte",
            EntityKind::Number => "Nummeraanduiding",
            EntityKind::Building => "Pand",
            EntityKind::Unit => "Verblijfsobject",
            EntityKind::Berth => "Ligplaats",
            EntityKind::Pitch => "Standplaats",
        }
    }

    /// Code embedded in the file names of this kind's shards / archive
    pub fn archive_code(&self) -> &'static str {
        match self {
            EntityKind::Place => "9999WPL",
            EntityKind::PlaceMunicipality => "GEM-WPL-RELATIE",
            EntityKind::PublicSpace => "9999OPR",
            EntityKind::Number => "9999NUM",
            EntityKind::Building => "9999PND",
            EntityKind::Unit => "9999VBO",
            EntityKind::Berth => "9999LIG",
            EntityKind::Pitch => "9999STA",
        }
    }

    /// Store table this kind is loaded into
    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::Place => "places",
            EntityKind::PlaceMunicipality => "place_municipalities",
            EntityKind::PublicSpace => "public_spaces",
            EntityKind::Number => "numbers",
            EntityKind::Building => "buildings",
            EntityKind::Unit => "units",
            EntityKind::Berth => "berths",
            EntityKind::Pitch => "pitches",
        }
    }

    /// Status label a record must carry to count as active, if the kind has one
    pub fn active_status(&self) -> Option<&'static str> {
        match self {
            EntityKind::Place => Some("Woonplaats aangewezen"),
            EntityKind::PublicSpace | EntityKind::Number => Some("Naamgeving uitgegeven"),
            _ => None,
        }
    }

    /// Number of ordinates per geometry point, for kinds that carry geometry
    pub fn geometry_dimension(&self) -> Option<usize> {
        match self {
            EntityKind::Building => Some(3),
            EntityKind::Place | EntityKind::Berth | EntityKind::Pitch => Some(2),
            _ => None,
        }
    }

    pub fn position_source(&self) -> Option<PositionSource> {
        match self {
            EntityKind::Unit => Some(PositionSource::Pos),
            EntityKind::Berth | EntityKind::Pitch => Some(PositionSource::Geometry),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for EntityKind {
    type Err = BagError;

    /// Accepts the snake_case name or the BAG object tag, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        EntityKind::all()
            .iter()
            .copied()
            .find(|k| {
                k.name().eq_ignore_ascii_case(wanted) || k.object_tag().eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| BagError::UnknownKind(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kind_by_name_and_tag() {
        assert_eq!("unit".parse::<EntityKind>().unwrap(), EntityKind::Unit);
        assert_eq!(
            "Verblijfsobject".parse::<EntityKind>().unwrap(),
            EntityKind::Unit
        );
        assert_eq!(
            "gemeentewoonplaatsrelatie".parse::<EntityKind>().unwrap(),
            EntityKind::PlaceMunicipality
        );
    }

    #[test]
    fn test_unknown_kind_is_error() {
        let err = "Perceel".parse::<EntityKind>().unwrap_err();
        assert!(matches!(err, BagError::UnknownKind(ref k) if k == "Perceel"));
    }

    #[test]
    fn test_building_geometry_has_three_ordinates() {
        assert_eq!(EntityKind::Building.geometry_dimension(), Some(3));
        assert_eq!(EntityKind::Berth.geometry_dimension(), Some(2));
        assert_eq!(EntityKind::Number.geometry_dimension(), None);
    }
}
