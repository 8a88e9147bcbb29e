//! Seam for the obfuscation-reversal transform supplied by the embedder.

use vireo_core::TransformProgram;

/// Computes and applies player transform programs.
///
/// The resolver decides *when* to extract a program and which one to apply;
/// the actual transform algorithm lives behind this trait and may be
/// supplied by any conforming implementation.
pub trait CipherEngine: Send + Sync {
    /// Derive a transform program from a player script body. `None` means
    /// the script shape was not recognized.
    fn extract_actions(&self, script_body: &str) -> Option<TransformProgram>;

    /// Apply `program` to a single cipher value, yielding the signature key
    /// to append to the stream URL.
    fn decipher(&self, cipher_value: &str, program: &TransformProgram) -> Option<String>;
}
