//! CSS color string validation for color fields

const NAMED_COLORS: &[&str] = &[
    "aliceblue", "antiquewhite", "aqua", "aquamarine", "azure", "beige", "bisque", "black",
    "blanchedalmond", "blue", "blueviolet", "brown", "burlywood", "cadetblue", "chartreuse",
    "chocolate", "coral", "cornflowerblue", "cornsilk", "crimson", "cyan", "darkblue",
    "darkcyan", "darkgoldenrod", "darkgray", "darkgreen", "darkgrey", "darkkhaki",
    "darkmagenta", "darkolivegreen", "darkorange", "darkorchid", "darkred", "darksalmon",
    "darkseagreen", "darkslateblue", "darkslategray", "darkslategrey", "darkturquoise",
    "darkviolet", "deeppink", "deepskyblue", "dimgray", "dimgrey", "dodgerblue", "firebrick",
    "floralwhite", "forestgreen", "fuchsia", "gainsboro", "ghostwhite", "gold", "goldenrod",
    "gray", "green", "greenyellow", "grey", "honeydew", "hotpink", "indianred", "indigo",
    "ivory", "khaki", "lavender", "lavenderblush", "lawngreen", "lemonchiffon", "lightblue",
    "lightcoral", "lightcyan", "lightgoldenrodyellow", "lightgray", "lightgreen", "lightgrey",
    "lightpink", "lightsalmon", "lightseagreen", "lightskyblue", "lightslategray",
    "lightslategrey", "lightsteelblue", "lightyellow", "lime", "limegreen", "linen", "magenta",
    "maroon", "mediumaquamarine", "mediumblue", "mediumorchid", "mediumpurple",
    "mediumseagreen", "mediumslateblue", "mediumspringgreen", "mediumturquoise",
    "mediumvioletred", "midnightblue", "mintcream", "mistyrose", "moccasin", "navajowhite",
    "navy", "oldlace", "olive", "olivedrab", "orange", "orangered", "orchid", "palegoldenrod",
    "palegreen", "paleturquoise", "palevioletred", "papayawhip", "peachpuff", "peru", "pink",
    "plum", "powderblue", "purple", "rebeccapurple", "red", "rosybrown", "royalblue",
    "saddlebrown", "salmon", "sandybrown", "seagreen", "seashell", "sienna", "silver",
    "skyblue", "slateblue", "slategray", "slategrey", "snow", "springgreen", "steelblue", "tan",
    "teal", "thistle", "tomato", "transparent", "turquoise", "violet", "wheat", "white",
    "whitesmoke", "yellow", "yellowgreen",
];

const FUNCTIONAL_PREFIXES: &[&str] = &["rgb(", "rgba(", "hsl(", "hsla("];

/// Accepts named colors, `#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa` and the
/// `rgb()`/`rgba()`/`hsl()`/`hsla()` functional forms.
pub fn is_valid_color(value: &str) -> bool {
    let value = value.trim();
    if let Some(hex) = value.strip_prefix('#') {
        return matches!(hex.len(), 3 | 4 | 6 | 8) && hex.chars().all(|c| c.is_ascii_hexdigit());
    }
    let lower = value.to_ascii_lowercase();
    if let Some(prefix) = FUNCTIONAL_PREFIXES.iter().find(|p| lower.starts_with(**p)) {
        let args = &lower[prefix.len()..];
        return args.ends_with(')')
            && args[..args.len() - 1]
                .split(',')
                .all(|part| !part.trim().is_empty());
    }
    NAMED_COLORS.contains(&lower.as_str())
}

/// Format an `[r, g, b]` triple in 0..=1 as `#rrggbb`.
pub fn rgb_to_hex(rgb: [f64; 3]) -> String {
    let channel = |c: f64| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
    format!(
        "#{:02x}{:02x}{:02x}",
        channel(rgb[0]),
        channel(rgb[1]),
        channel(rgb[2])
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_forms() {
        assert!(is_valid_color("#fff"));
        assert!(is_valid_color("#ffffff"));
        assert!(is_valid_color("#ffffff80"));
        assert!(!is_valid_color("#ffff0"));
        assert!(!is_valid_color("#gggggg"));
    }

    #[test]
    fn test_named_and_functional() {
        assert!(is_valid_color("yellow"));
        assert!(is_valid_color("Black"));
        assert!(is_valid_color("rgb(10, 20, 30)"));
        assert!(!is_valid_color("rgb(10, , 30)"));
        assert!(!is_valid_color("not-a-color"));
    }

    #[test]
    fn test_rgb_to_hex() {
        assert_eq!(rgb_to_hex([1.0, 0.0, 0.5]), "#ff0080");
        assert_eq!(rgb_to_hex([2.0, -1.0, 0.0]), "#ff0000");
    }
}
