//! Scene composition helpers
//!
//! Every object these helpers return is already registered, so it can be
//! assigned to reference fields straight away.

use crate::error::SyncResult;
use crate::graph::ObjectGraph;
use crate::object::SyncObject;
use crate::schema::color::rgb_to_hex;
use crate::value::Value;

fn registered(graph: &ObjectGraph, obj: SyncObject) -> SyncResult<SyncObject> {
    graph.register(&obj)?;
    Ok(obj)
}

fn light_rig(
    graph: &ObjectGraph,
    ambient: [f64; 3],
    directional: &[([f64; 3], [f64; 3])],
) -> SyncResult<Vec<SyncObject>> {
    let mut lights = Vec::with_capacity(directional.len() + 1);
    lights.push(registered(
        graph,
        graph.create_with("AmbientLight", [("color", rgb_to_hex(ambient))])?,
    )?);
    for (position, color) in directional {
        let light = graph.create("DirectionalLight")?;
        light.set("position", *position)?;
        light.set("color", rgb_to_hex(*color))?;
        lights.push(registered(graph, light)?);
    }
    Ok(lights)
}

/// One ambient and four colored directional lights.
pub fn lights_color(graph: &ObjectGraph) -> SyncResult<Vec<SyncObject>> {
    light_rig(
        graph,
        [0.312, 0.188, 0.4],
        &[
            ([1.0, 0.0, 1.0], [0.8, 0.0, 0.0]),
            ([1.0, 1.0, 1.0], [0.0, 0.8, 0.0]),
            ([0.0, 1.0, 1.0], [0.0, 0.0, 0.8]),
            ([-1.0, -1.0, -1.0], [0.9, 0.7, 0.9]),
        ],
    )
}

/// One ambient and four gray directional lights.
pub fn lights_gray(graph: &ObjectGraph) -> SyncResult<Vec<SyncObject>> {
    light_rig(
        graph,
        [0.6, 0.6, 0.6],
        &[
            ([0.0, 1.0, 1.0], [0.5, 0.5, 0.5]),
            ([0.0, 0.0, 1.0], [0.5, 0.5, 0.5]),
            ([1.0, 1.0, 1.0], [0.5, 0.5, 0.5]),
            ([-1.0, -1.0, -1.0], [0.7, 0.7, 0.7]),
        ],
    )
}

/// Buffer geometry from `(n, 3)` vertex positions and `(m, 3)` triangle
/// indices (typed arrays or nested lists).
pub fn plain_buffer_geometry(
    graph: &ObjectGraph,
    vertices: impl Into<Value>,
    faces: impl Into<Value>,
) -> SyncResult<SyncObject> {
    let geometry = graph.create("PlainBufferGeometry")?;
    geometry.set("vertices", vertices)?;
    geometry.set("faces", faces)?;
    registered(graph, geometry)
}

/// A text sprite at `position`, `height` units tall.
pub fn make_text(
    graph: &ObjectGraph,
    text: &str,
    position: [f64; 3],
    height: f64,
) -> SyncResult<SyncObject> {
    let texture = graph.create("TextTexture")?;
    texture.set("string", text)?;
    texture.set("color", "white")?;
    texture.set("size", 100)?;
    texture.set("squareTexture", false)?;
    let texture = registered(graph, texture)?;

    let material = registered(
        graph,
        graph.create_with("SpriteMaterial", [("map", &texture)])?,
    )?;

    let sprite = graph.create("Sprite")?;
    sprite.set("material", &material)?;
    sprite.set("position", position)?;
    sprite.set("scaleToTexture", true)?;
    sprite.set("scale", [1.0, height, 1.0])?;
    registered(graph, sprite)
}
