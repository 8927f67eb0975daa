/// Derive the cache key for an (audio, transcript) identity pair.
///
/// Pure and deterministic: the same pair always yields the same key. The
/// halves are joined with the ASCII unit separator so refs containing
/// ordinary path characters cannot collide.
pub fn session_key(audio_ref: &str, transcript_ref: &str) -> String {
    format!("{audio_ref}\u{1f}{transcript_ref}")
}
