fn main() {
    if let Err(err) = step_counter_lib::run() {
        eprintln!("step-counter: {err:#}");
        std::process::exit(1);
    }
}
