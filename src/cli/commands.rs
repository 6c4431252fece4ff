use clap::Subcommand;

use super::cache::CacheArgs;
use super::config::ConfigArgs;
use super::locate::LocateArgs;
use super::selector::SelectorArgs;

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Locate an element, healing the selector if it no longer matches
    Locate(LocateArgs),

    /// Inspect or maintain the healing cache
    Cache(CacheArgs),

    /// Manage AutoHeal configuration
    Config(ConfigArgs),

    /// Selector utilities (detection, normalization, Playwright parsing)
    Selector(SelectorArgs),

    /// Show version, build and provider information
    Info,
}
