//! Instruction text sent to the generation models.

use crate::request::OperationKind;

/// Style constraints appended to every image prompt.
pub const AESTHETIC_RULESET: &str = r#"
Rendering rules:
- Render the subject strictly as a wireframe mesh: visible edges and vertices only, no solid shading, no textures.
- Use a three-color palette: neon green lines (#39FF14), cyan highlights (#00FFFF), and magenta accents (#FF00FF).
- Style it as a retro 1980s CAD workstation render with crisp, evenly weighted vector lines.
- Use a pure black background (#000000) with no gradient, floor grid, or horizon.
- Do not draw any UI chrome: no text, labels, dimensions, axes, watermarks, borders, or toolbars.
"#;

pub const REFERENCE_GUIDANCE: &str = "The attached image is a reference for overall silhouette and \
    proportions only. Do not trace it, copy its colors, or keep its background. \
    The text description below is the primary specification.";

pub const ORBIT_PROMPT: &str = "Cinematic turntable shot: the camera performs one smooth, continuous \
    360-degree orbit around the wireframe mesh shown in the image, at a constant speed and a fixed \
    distance, keeping the object centered. Keep the pure black background, the glowing wireframe lines \
    and the exact geometry unchanged. No cuts, no zoom, no added objects. \
    The output video must have no audio track: silent, no music, no sound effects.";

/// Builds the final instruction for an operation. `Animate` ignores `user_text`.
pub fn compose_prompt(
    operation: OperationKind,
    user_text: &str,
    has_reference_image: bool,
) -> String {
    match operation {
        OperationKind::Create => {
            let create = format!(
                "Generate a stylized CAD wireframe rendering of: {user_text}. {AESTHETIC_RULESET}"
            );
            if has_reference_image {
                format!("{REFERENCE_GUIDANCE}\n\n{create}")
            } else {
                create
            }
        }
        OperationKind::Edit => format!(
            "Apply this modification to the wireframe schematic: {user_text}. \
             Maintain mesh aesthetic. {AESTHETIC_RULESET}"
        ),
        OperationKind::Animate => ORBIT_PROMPT.to_string(),
    }
}
