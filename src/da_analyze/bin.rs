use droidaudit::prelude::DaResult;
use droidaudit::{cli, da_analyze};

fn main() -> DaResult<()> {
    let args = cli::analyze().get_matches();
    da_analyze::run(&args)
}
