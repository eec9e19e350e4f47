//! Tests for GetMap query construction.

use tile_common::time::parse_date;
use tile_common::{Layer, TileExtent};
use wms_protocol::{GetMapError, GetMapRequest};

const GIBS: &str = "https://gibs.earthdata.nasa.gov/wms/epsg4326/best/wms.cgi";

#[test]
fn test_daily_url_matches_gibs_layout() {
    let layer = Layer::daily("VIIRS_SNPP_CorrectedReflectance_TrueColor");
    let date = parse_date("2022-05-01").unwrap();
    let req = GetMapRequest::for_tile(&layer, Some(date), TileExtent::new(-90, -180, 5), 128).unwrap();

    assert_eq!(
        req.to_url(GIBS),
        "https://gibs.earthdata.nasa.gov/wms/epsg4326/best/wms.cgi?\
version=1.3.0&service=WMS&request=GetMap&format=image/png&STYLE=default&\
bbox=-90,-180,-85,-175&CRS=EPSG:4326&HEIGHT=128&WIDTH=128&TIME=2022-05-01&\
layers=VIIRS_SNPP_CorrectedReflectance_TrueColor"
    );
}

#[test]
fn test_static_url_omits_time() {
    let layer = Layer::fixed("OSM_Land_Water_Map");
    let req = GetMapRequest::for_tile(&layer, None, TileExtent::new(40, -75, 5), 256).unwrap();

    assert_eq!(
        req.to_query_string(),
        "version=1.3.0&service=WMS&request=GetMap&format=image/png&STYLE=default&\
bbox=40,-75,45,-70&CRS=EPSG:4326&HEIGHT=256&WIDTH=256&layers=OSM_Land_Water_Map"
    );
}

#[test]
fn test_endpoint_with_existing_query() {
    let layer = Layer::fixed("OSM_Land_Water_Map");
    let req = GetMapRequest::for_tile(&layer, None, TileExtent::new(0, 0, 5), 8).unwrap();
    let url = req.to_url("http://localhost:8080/wms?map=gibs");
    assert!(url.starts_with("http://localhost:8080/wms?map=gibs&version=1.3.0&"));
}

#[test]
fn test_daily_layer_without_date_rejected() {
    let layer = Layer::daily("VIIRS_SNPP_Clear_Sky_Confidence_Day");
    let err = GetMapRequest::for_tile(&layer, None, TileExtent::new(0, 0, 5), 128).unwrap_err();
    assert!(matches!(err, GetMapError::MissingTime(_)));
}

#[test]
fn test_static_layer_with_date_rejected() {
    let layer = Layer::fixed("OSM_Land_Water_Map");
    let date = parse_date("2022-05-01").unwrap();
    let err = GetMapRequest::for_tile(&layer, Some(date), TileExtent::new(0, 0, 5), 128).unwrap_err();
    assert!(matches!(err, GetMapError::UnexpectedTime(_)));
}
