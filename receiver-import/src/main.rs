use rocket::launch;

#[launch]
fn rocket() -> _ {
    receiver_import::init_logger();
    log::info!("starting receiver import service");
    receiver_import::rocket()
}
