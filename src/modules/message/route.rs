use actix_web::web::{scope, ServiceConfig};

use crate::modules::message::handle::*;

pub fn configure(cfg: &mut ServiceConfig) {
    cfg.service(
        scope("/messages")
            .service(edit_message)
            .service(delete_message)
            .service(add_reaction)
            .service(remove_reaction),
    );
}
