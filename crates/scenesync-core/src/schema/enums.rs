//! Closed string domains for enum-valued fields
//!
//! Member names match the renderer's constant names so they pass through to
//! the peer unchanged.

/// A named closed set of string constants
#[derive(Debug, PartialEq, Eq)]
pub struct EnumDomain {
    pub name: &'static str,
    pub members: &'static [&'static str],
}

impl EnumDomain {
    pub fn contains(&self, value: &str) -> bool {
        self.members.contains(&value)
    }
}

pub static BLENDING_MODE: EnumDomain = EnumDomain {
    name: "BlendingMode",
    members: &[
        "NoBlending",
        "NormalBlending",
        "AdditiveBlending",
        "SubtractiveBlending",
        "MultiplyBlending",
        "CustomBlending",
    ],
};

pub static SIDE: EnumDomain = EnumDomain {
    name: "Side",
    members: &["FrontSide", "BackSide", "DoubleSide"],
};

pub static SHADING: EnumDomain = EnumDomain {
    name: "Shading",
    members: &["NoShading", "FlatShading", "SmoothShading"],
};

pub static COLORS: EnumDomain = EnumDomain {
    name: "Colors",
    members: &["NoColors", "FaceColors", "VertexColors"],
};

pub static RENDERERS: EnumDomain = EnumDomain {
    name: "Renderers",
    members: &["webgl", "canvas", "auto"],
};

pub static WRAPPING_MODES: EnumDomain = EnumDomain {
    name: "WrappingModes",
    members: &[
        "RepeatWrapping",
        "ClampToEdgeWrapping",
        "MirroredRepeatWrapping",
    ],
};

pub static FILTERS: EnumDomain = EnumDomain {
    name: "Filters",
    members: &[
        "NearestFilter",
        "NearestMipMapNearestFilter",
        "NearestMipMapLinearFilter",
        "LinearFilter",
        "LinearMipMapNearestFilter",
        "LinearMipMapLinearFilter",
    ],
};

pub static DATA_TYPES: EnumDomain = EnumDomain {
    name: "DataTypes",
    members: &[
        "UnsignedByteType",
        "ByteType",
        "ShortType",
        "UnsignedShortType",
        "IntType",
        "UnsignedIntType",
        "FloatType",
        "HalfFloatType",
    ],
};

pub static PIXEL_TYPES: EnumDomain = EnumDomain {
    name: "PixelTypes",
    members: &[
        "UnsignedShort4444Type",
        "UnsignedShort5551Type",
        "UnsignedShort565Type",
    ],
};

pub static PIXEL_FORMATS: EnumDomain = EnumDomain {
    name: "PixelFormats",
    members: &[
        "AlphaFormat",
        "RGBFormat",
        "RGBAFormat",
        "LuminanceFormat",
        "LuminanceAlphaFormat",
        "DepthFormat",
    ],
};

pub static EQUATIONS: EnumDomain = EnumDomain {
    name: "Equations",
    members: &[
        "AddEquation",
        "SubtractEquation",
        "ReverseSubtractEquation",
        "MinEquation",
        "MaxEquation",
    ],
};

pub static BLEND_FACTORS: EnumDomain = EnumDomain {
    name: "BlendFactors",
    members: &[
        "ZeroFactor",
        "OneFactor",
        "SrcColorFactor",
        "OneMinusSrcColorFactor",
        "SrcAlphaFactor",
        "OneMinusSrcAlphaFactor",
        "DstAlphaFactor",
        "OneMinusDstAlphaFactor",
        "DstColorFactor",
        "OneMinusDstColorFactor",
        "SrcAlphaSaturateFactor",
    ],
};

pub static MAPPING_MODES: EnumDomain = EnumDomain {
    name: "MappingModes",
    members: &[
        "UVMapping",
        "CubeReflectionMapping",
        "CubeRefractionMapping",
        "EquirectangularReflectionMapping",
        "EquirectangularRefractionMapping",
        "SphericalReflectionMapping",
    ],
};

pub static LINES: EnumDomain = EnumDomain {
    name: "Lines",
    members: &["LineStrip", "LinePieces"],
};

/// Every built-in domain, for lookup by name
pub static ALL_DOMAINS: &[&EnumDomain] = &[
    &BLENDING_MODE,
    &SIDE,
    &SHADING,
    &COLORS,
    &RENDERERS,
    &WRAPPING_MODES,
    &FILTERS,
    &DATA_TYPES,
    &PIXEL_TYPES,
    &PIXEL_FORMATS,
    &EQUATIONS,
    &BLEND_FACTORS,
    &MAPPING_MODES,
    &LINES,
];

pub fn domain(name: &str) -> Option<&'static EnumDomain> {
    ALL_DOMAINS.iter().copied().find(|d| d.name == name)
}
