use droidaudit::prelude::DaResult;
use droidaudit::{cli, da_aresources};

fn main() -> DaResult<()> {
    let args = cli::aresources().get_matches();
    da_aresources::run(&args)
}
