//! Handler for `tether check`.

use std::path::PathBuf;

use miette::Result;

pub fn exec(universe: Option<PathBuf>) -> Result<()> {
    let loaded = super::load_universe(universe)?;
    let repo = &loaded.repository;
    let fragments = repo.resource_ids().filter(|r| repo.is_fragment(*r)).count();
    println!(
        "Universe OK: {} resource(s), {} fragment(s); {} mandatory, {} optional, {} resolved",
        repo.len(),
        fragments,
        loaded.mandatory.len(),
        loaded.optional.len(),
        loaded.resolved.len()
    );
    Ok(())
}
