use actix_web::web::{scope, ServiceConfig};

use crate::modules::{conversation::handle::*, message};

pub fn configure(cfg: &mut ServiceConfig) {
    cfg.service(
        scope("/conversations")
            .service(list_conversations)
            .service(start_with_instructor)
            .service(mark_conversation_read)
            .service(toggle_pin)
            .service(message::handle::get_messages)
            .service(message::handle::send_message)
            .service(message::handle::search_messages),
    );
}
