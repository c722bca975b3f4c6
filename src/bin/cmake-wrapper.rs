fn main() -> anyhow::Result<()> {
    let args = std::env::args_os().skip(1).collect::<Vec<_>>();

    cmake_wrapper::cli::run(args)
}
