fn main() {
    serial_bridge::cli::run()
}
