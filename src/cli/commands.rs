use clap::Subcommand;

use super::config::ConfigArgs;
use super::similarity::TextSimArgs;
use super::visual::{CompareArgs, LocateArgs, PhashArgs};

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Inspect or validate the healing configuration
    Config(ConfigArgs),

    /// Print the perceptual hash of an image
    Phash(PhashArgs),

    /// Compare two images (pixel, feature and histogram similarity)
    Compare(CompareArgs),

    /// Find a reference image inside a screenshot
    Locate(LocateArgs),

    /// Score the similarity of two texts
    TextSim(TextSimArgs),
}
