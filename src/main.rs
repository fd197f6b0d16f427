#[rocket::launch]
fn rocket() -> _ {
    prep_server::rocket()
}
