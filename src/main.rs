fn main() {
    healthai_lib::run()
}
