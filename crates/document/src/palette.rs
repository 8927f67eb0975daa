/// Fixed speaker color palette. Colors are assigned by creation index and
/// cycle once the palette is exhausted, so speaker N always gets the same
/// color regardless of how it was created (import, rename, or acceptance).
const SPEAKER_PALETTE: [&str; 10] = [
    "#2563eb", "#dc2626", "#16a34a", "#9333ea", "#ea580c",
    "#0891b2", "#db2777", "#ca8a04", "#4f46e5", "#0d9488",
];

pub fn speaker_color(creation_index: usize) -> &'static str {
    SPEAKER_PALETTE[creation_index % SPEAKER_PALETTE.len()]
}
