use crate::link::{self, LinkChannel};

/// Queries every interface named in `args` in order and returns the process
/// exit code. Stops at the first failed query.
pub fn run(args: &[String]) -> i32 {
    run_with::<link::ControlSocket>(args)
}

fn run_with<C: LinkChannel>(args: &[String]) -> i32 {
    let prog = args.get(0).map(String::as_str).unwrap_or("ethlink");

    if args.len() < 2 || args[1] == "-h" || args[1] == "--help" {
        usage(prog);
        return 1;
    }

    for name in &args[1..] {
        match link::query_with::<C>(name) {
            Ok(status) => println!("{}", status),
            // Already reported on stderr; remaining names are not processed.
            Err(_) => return 1,
        }
    }

    0
}

fn usage(prog: &str) {
    eprintln!();
    eprintln!("Usage: {} [ -h | --help ]", prog);
    eprintln!("       {} INTERFACE ...", prog);
    eprintln!();
}
