use crate::types::TargetLanguage;

const EDIT_INSTRUCTION_TEMPLATE: &str = "Perform a professional image editing task.
Goal: Translate all visible text in the image to {language}.

Instructions:
1. Detect all text regions in the original image.
2. Erase the original text completely, in-filling the background texture naturally.
3. Render the {language} translation in the exact same positions.
4. Match the original font style, size, color, rotation, and perspective.
5. Do not change the aspect ratio, resolution, or non-text visual elements.

Return the fully edited image.";

/// Build the in-place text translation instruction sent alongside the image.
pub fn build_instruction(language: TargetLanguage) -> String {
    EDIT_INSTRUCTION_TEMPLATE.replace("{language}", language.as_str())
}
