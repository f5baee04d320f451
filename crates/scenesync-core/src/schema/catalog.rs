//! Built-in scene types
//!
//! Each type is composed from its parent's schema plus a fragment of its own
//! fields. Field names are the names the peer's renderer model expects.

use std::f64::consts::PI;

use crate::array::{DType, ShapePattern};
use crate::schema::enums::{
    BLENDING_MODE, BLEND_FACTORS, COLORS, DATA_TYPES, EQUATIONS, FILTERS, MAPPING_MODES,
    PIXEL_FORMATS, RENDERERS, SHADING, SIDE, WRAPPING_MODES,
};
use crate::schema::field::{Capability, FieldDescriptor as F, FieldKind};
use crate::schema::registry::{SchemaBuilder, TypeSchema};
use crate::value::Value;

fn rows_of_3() -> Option<ShapePattern> {
    Some(ShapePattern::new([None, Some(3)]))
}

fn vector3_kind() -> FieldKind {
    FieldKind::Vector {
        element: Box::new(FieldKind::Float),
        len: 3,
    }
}

fn object3d() -> TypeSchema {
    SchemaBuilder::new("Object3D")
        .capability(Capability::Object3D)
        .fields([
            F::string("name", ""),
            F::vector3("position", [0.0, 0.0, 0.0]),
            F::vector3("rotation", [0.0, 0.0, 0.0]),
            F::vector3("scale", [1.0, 1.0, 1.0]),
            F::vector3("up", [0.0, 1.0, 0.0]),
            F::boolean("visible", true),
            F::boolean("castShadow", false),
            F::boolean("receiveShadow", false),
            F::object_list("children", Capability::Object3D),
        ])
        .build()
}

fn camera(object3d: &TypeSchema) -> TypeSchema {
    SchemaBuilder::new("Camera")
        .extend(object3d)
        .capability(Capability::Camera)
        .build()
}

fn geometry() -> TypeSchema {
    SchemaBuilder::new("Geometry")
        .capability(Capability::Geometry)
        .field(F::string("name", ""))
        .build()
}

fn texture() -> TypeSchema {
    SchemaBuilder::new("Texture")
        .capability(Capability::Texture)
        .fields([
            F::enumeration("mapping", &MAPPING_MODES, "UVMapping"),
            F::enumeration("wrapS", &WRAPPING_MODES, "ClampToEdgeWrapping"),
            F::enumeration("wrapT", &WRAPPING_MODES, "ClampToEdgeWrapping"),
            F::enumeration("magFilter", &FILTERS, "LinearFilter"),
            F::enumeration("minFilter", &FILTERS, "LinearMipMapLinearFilter"),
            F::enumeration("format", &PIXEL_FORMATS, "RGBAFormat"),
            F::enumeration("type", &DATA_TYPES, "UnsignedByteType"),
            F::int("anisotropy", 1),
            F::vector2("repeat", [1.0, 1.0]),
            F::vector2("offset", [0.0, 0.0]),
            F::boolean("flipY", true),
        ])
        .build()
}

fn material() -> TypeSchema {
    SchemaBuilder::new("Material")
        .capability(Capability::Material)
        .fields([
            F::string("name", ""),
            F::float("opacity", 1.0).range(0.0, 1.0),
            F::boolean("transparent", false),
            F::enumeration("side", &SIDE, "FrontSide"),
            F::enumeration("blending", &BLENDING_MODE, "NormalBlending"),
            F::enumeration("blendSrc", &BLEND_FACTORS, "SrcAlphaFactor"),
            F::enumeration("blendDst", &BLEND_FACTORS, "OneMinusSrcAlphaFactor"),
            F::enumeration("blendEquation", &EQUATIONS, "AddEquation"),
            F::boolean("depthTest", true),
            F::boolean("depthWrite", true),
            F::boolean("visible", true),
        ])
        .build()
}

fn mesh(object3d: &TypeSchema) -> TypeSchema {
    SchemaBuilder::new("Mesh")
        .extend(object3d)
        .fields([
            F::nullable_object("geometry", Capability::Geometry),
            F::nullable_object("material", Capability::Material),
        ])
        .build()
}

fn controls() -> TypeSchema {
    SchemaBuilder::new("Controls")
        .capability(Capability::Controls)
        .field(F::nullable_object("controlling", Capability::Object3D))
        .build()
}

fn effect() -> TypeSchema {
    SchemaBuilder::new("Effect")
        .capability(Capability::Effect)
        .build()
}

/// Every built-in type, parents before children
pub fn builtin_types() -> Vec<TypeSchema> {
    let object3d = object3d();
    let camera = camera(&object3d);
    let geometry = geometry();
    let texture = texture();
    let material = material();
    let mesh = mesh(&object3d);
    let controls = controls();
    let effect = effect();

    let scaled_object = SchemaBuilder::new("ScaledObject").extend(&object3d).build();

    let scene = SchemaBuilder::new("Scene")
        .extend(&object3d)
        .capability(Capability::Scene)
        .build();

    let perspective_camera = SchemaBuilder::new("PerspectiveCamera")
        .extend(&camera)
        .fields([
            F::float("fov", 50.0),
            F::float("aspect", 1.0),
            F::float("near", 0.1),
            F::float("far", 2000.0),
        ])
        .build();

    let ambient_light = SchemaBuilder::new("AmbientLight")
        .extend(&object3d)
        .capability(Capability::Light)
        .fields([F::color("color", "#ffffff"), F::float("intensity", 1.0)])
        .build();

    let directional_light = SchemaBuilder::new("DirectionalLight")
        .extend(&ambient_light)
        .field(F::vector3("position", [0.0, 1.0, 0.0]))
        .build();

    let box_geometry = SchemaBuilder::new("BoxGeometry")
        .extend(&geometry)
        .fields([
            F::float("width", 1.0),
            F::float("height", 1.0),
            F::float("depth", 1.0),
            F::int("widthSegments", 1),
            F::int("heightSegments", 1),
            F::int("depthSegments", 1),
        ])
        .build();

    let sphere_geometry = SchemaBuilder::new("SphereGeometry")
        .extend(&geometry)
        .fields([
            F::float("radius", 1.0),
            F::int("widthSegments", 8),
            F::int("heightSegments", 6),
            F::float("phiStart", 0.0),
            F::float("phiLength", 2.0 * PI),
            F::float("thetaStart", 0.0),
            F::float("thetaLength", PI),
        ])
        .build();

    let plain_geometry = SchemaBuilder::new("PlainGeometry")
        .extend(&geometry)
        .fields([
            F::array("vertices", DType::Float32, rows_of_3()),
            F::array("faces", DType::Uint32, rows_of_3()),
            F::array(
                "faceColors",
                DType::Float32,
                Some(ShapePattern::new([None, Some(3), Some(3)])),
            )
            .help("Per-face vertex colors: [[v1_r, v1_g, v1_b], [v2_...], [v3_...]]"),
            F::list("colors", FieldKind::Color { nullable: false }, Vec::new()),
            F::list("faceNormals", vector3_kind(), Vec::new()),
        ])
        .build();

    let plain_buffer_geometry = SchemaBuilder::new("PlainBufferGeometry")
        .extend(&geometry)
        .fields([
            F::array("vertices", DType::Float32, rows_of_3()),
            F::array("faces", DType::Uint32, rows_of_3()),
            F::array("colors", DType::Float32, rows_of_3()).help("Vertex colors"),
        ])
        .build();

    let surface_geometry = SchemaBuilder::new("SurfaceGeometry")
        .extend(&geometry)
        .capability(Capability::SurfaceGeometry)
        .fields([
            F::list("z", FieldKind::Float, vec![Value::Float(0.0); 100]),
            F::int("width", 10),
            F::int("height", 10),
            F::int("width_segments", 10),
            F::int("height_segments", 10),
        ])
        .build();

    let face_geometry = SchemaBuilder::new("FaceGeometry")
        .extend(&geometry)
        .fields([
            F::list("vertices", FieldKind::Float, Vec::new())
                .help("Flat [x0, y0, z0, x1, y1, z1, ...]"),
            F::list("face3", FieldKind::Int, Vec::new()),
            F::list("face4", FieldKind::Int, Vec::new()),
            F::list("facen", FieldKind::List(Box::new(FieldKind::Int)), Vec::new()),
        ])
        .build();

    let data_texture = SchemaBuilder::new("DataTexture")
        .extend(&texture)
        .fields([
            F::array("data", DType::Uint8, Some(ShapePattern::new([None]))),
            F::int("width", 0),
            F::int("height", 0),
        ])
        .build();

    let text_texture = SchemaBuilder::new("TextTexture")
        .extend(&texture)
        .fields([
            F::string("string", ""),
            F::string("fontFace", "Arial"),
            F::int("size", 12),
            F::color("color", "black"),
            F::boolean("squareTexture", true),
        ])
        .build();

    let lambert_material = SchemaBuilder::new("MeshLambertMaterial")
        .extend(&material)
        .fields([
            F::color("color", "#ffffff"),
            F::color("emissive", "#000000"),
            F::nullable_object("map", Capability::Texture),
            F::boolean("wireframe", false),
            F::enumeration("vertexColors", &COLORS, "NoColors"),
        ])
        .build();

    let shader_material = SchemaBuilder::new("ShaderMaterial")
        .extend(&material)
        .fields([
            F::string("fragmentShader", "void main(){ }"),
            F::string("vertexShader", "void main(){ }"),
            F::boolean("morphTargets", false),
            F::boolean("lights", false),
            F::boolean("morphNormals", false),
            F::boolean("wireframe", false),
            F::enumeration("vertexColors", &COLORS, "NoColors"),
            F::boolean("skinning", false),
            F::boolean("fog", false),
            F::enumeration("shading", &SHADING, "SmoothShading"),
            F::float("linewidth", 1.0),
            F::float("wireframeLinewidth", 1.0),
        ])
        .build();

    let particle_material = SchemaBuilder::new("ParticleSystemMaterial")
        .extend(&material)
        .fields([
            F::color("color", "yellow"),
            F::nullable_object("map", Capability::Texture),
            F::float("size", 1.0),
            F::boolean("sizeAttenuation", false),
            F::boolean("vertexColors", false),
            F::boolean("fog", false),
        ])
        .build();

    let sprite_material = SchemaBuilder::new("SpriteMaterial")
        .extend(&material)
        .fields([
            F::nullable_object("map", Capability::Texture),
            F::color("color", "#ffffff"),
            F::float("rotation", 0.0),
            F::boolean("fog", false),
        ])
        .build();

    let surface_grid = SchemaBuilder::new("SurfaceGrid")
        .extend(&mesh)
        .fields([
            F::object("geometry", Capability::SurfaceGeometry),
            F::object("material", Capability::Material),
        ])
        .build();

    let sprite = SchemaBuilder::new("Sprite")
        .extend(&object3d)
        .fields([
            F::nullable_object("material", Capability::Material),
            F::boolean("scaleToTexture", false),
        ])
        .build();

    let orbit_controls = SchemaBuilder::new("OrbitControls")
        .extend(&controls)
        .field(F::vector3("target", [0.0, 0.0, 0.0]))
        .build();

    let trackball_controls = SchemaBuilder::new("TrackballControls")
        .extend(&controls)
        .field(F::vector3("target", [0.0, 0.0, 0.0]))
        .build();

    let fly_controls = SchemaBuilder::new("FlyControls")
        .extend(&controls)
        .fields([
            F::float("forward_speed", 0.0),
            F::float("lateral_speed", 0.0),
            F::float("upward_speed", 0.0),
            F::float("roll", 0.0),
            F::float("pitch", 0.0),
            F::float("yaw", 0.0),
        ])
        .build();

    let picker = SchemaBuilder::new("Picker")
        .extend(&controls)
        .fields([
            F::string("event", "click"),
            F::nullable_object("root", Capability::Object3D),
            F::dict_list("picked"),
            F::float("distance", 0.0),
            F::vector3("point", [0.0, 0.0, 0.0]),
            F::nullable_object("object", Capability::Object3D),
            F::int_vector3("face", [0, 0, 0]),
            F::vector3("faceNormal", [0.0, 0.0, 0.0]),
            F::list("faceVertices", vector3_kind(), Vec::new()),
            F::int("faceIndex", 0),
            F::boolean("all", false),
        ])
        .build();

    let anaglyph_effect = SchemaBuilder::new("AnaglyphEffect").extend(&effect).build();

    let renderer = SchemaBuilder::new("Renderer")
        .capability(Capability::Renderer)
        .fields([
            F::string("width", "600"),
            F::string("height", "400"),
            F::enumeration("renderer_type", &RENDERERS, "auto"),
            F::object("scene", Capability::Scene),
            F::object("camera", Capability::Camera),
            F::object_list("controls", Capability::Controls),
            F::nullable_object("effect", Capability::Effect),
            F::nullable_color("background", Some("black")),
            F::float("background_opacity", 0.0).range(0.0, 1.0),
        ])
        .build();

    vec![
        object3d,
        scaled_object,
        scene,
        camera,
        perspective_camera,
        ambient_light,
        directional_light,
        geometry,
        box_geometry,
        sphere_geometry,
        plain_geometry,
        plain_buffer_geometry,
        surface_geometry,
        face_geometry,
        texture,
        data_texture,
        text_texture,
        material,
        lambert_material,
        shader_material,
        particle_material,
        sprite_material,
        mesh,
        surface_grid,
        sprite,
        controls,
        orbit_controls,
        trackball_controls,
        fly_controls,
        picker,
        effect,
        anaglyph_effect,
        renderer,
    ]
}
