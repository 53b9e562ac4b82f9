//! `GeoJSON` rendering of computed routes

use geo::{Coord, LineString, Point};
use geojson::{Feature, Geometry, Value as GeoJsonValue};
use serde_json::json;

use crate::Error;
use crate::model::{Network, Route};

impl Route {
    /// Converts the route to a `GeoJSON` `Feature`.
    ///
    /// The geometry is a `LineString` through the path's node locations,
    /// a `Point` for a single node route and `null` when there is no path.
    pub fn to_geojson(&self, network: &Network) -> Result<Feature, Error> {
        let coords: Vec<Coord<f64>> = self
            .path
            .iter()
            .map(|id| {
                network
                    .node(id)
                    .map(|node| node.geometry().into())
                    .ok_or_else(|| Error::UnknownNode(id.clone()))
            })
            .collect::<Result<_, _>>()?;

        let geometry = match coords.len() {
            0 => None,
            1 => Some(Geometry::new(GeoJsonValue::from(&Point::from(coords[0])))),
            _ => Some(Geometry::new(GeoJsonValue::from(&LineString::new(coords)))),
        };

        let value = json!({
            "type": "Feature",
            "geometry": geometry,
            "properties": {
                "path": self.path,
                "totalDistance": self.total_distance,
                "isSafe": self.is_safe,
                "edgeIds": self.edges.iter().map(|edge| edge.id.as_str()).collect::<Vec<_>>(),
            }
        });

        serde_json::from_value::<Feature>(value).map_err(|e| Error::GeoJsonError(e.to_string()))
    }
}
