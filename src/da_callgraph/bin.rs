use droidaudit::prelude::DaResult;
use droidaudit::{cli, da_callgraph};

fn main() -> DaResult<()> {
    let args = cli::callgraph().get_matches();
    da_callgraph::run(&args)
}
