use droidaudit::prelude::DaResult;
use droidaudit::{cli, da_classes};

fn main() -> DaResult<()> {
    let args = cli::classes().get_matches();
    da_classes::run(&args)
}
