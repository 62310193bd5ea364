fn main() {
    comoving_groups::cli::run();
}
