use droidaudit::prelude::DaResult;
use droidaudit::{cli, da_manifest};

fn main() -> DaResult<()> {
    let args = cli::manifest().get_matches();
    da_manifest::run(&args)
}
