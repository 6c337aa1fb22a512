use super::guard::{RouteGuard, with_authorization, with_optional_authorization};
use super::handler;
use super::handler::PageQuery;
use crate::application_port::AuthContext;
use crate::server::*;
use std::convert::Infallible;
use std::sync::Arc;
use warp::Filter;

const USER: RouteGuard = RouteGuard::roles(&["User"]);
const PUBLIC: RouteGuard = RouteGuard::allow_anonymous(&[]);

pub fn routes(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let register = warp::post()
        .and(warp::path("register"))
        .and(warp::path::end())
        .and(warp::body::json())
        .and(with(server.auth_service.clone()))
        .and_then(handler::register);

    let login = warp::post()
        .and(warp::path("login"))
        .and(warp::path::end())
        .and(warp::body::json())
        .and(with(server.auth_service.clone()))
        .and_then(handler::login);

    let refresh = warp::post()
        .and(warp::path("refresh"))
        .and(warp::path::end())
        .and(warp::body::json())
        .and(with(server.auth_service.clone()))
        .and_then(handler::refresh);

    let profile = warp::get()
        .and(warp::path("users"))
        .and(warp::path::param::<String>())
        .and(warp::path::end())
        .and(with_optional_authorization(
            server.auth_service.clone(),
            PUBLIC,
        ))
        .and(with(server.user_service.clone()))
        .and_then(handler::get_profile);

    let conversation = warp::get()
        .and(warp::path("messages"))
        .and(warp::path::param::<i64>())
        .and(warp::path::end())
        .and(warp::query::<PageQuery>())
        .and(with_authorization(server.auth_service.clone(), USER))
        .and(with(server.message_service.clone()))
        .and_then(handler::get_conversation);

    let message_read = warp::patch()
        .and(warp::path("messages"))
        .and(warp::path::param::<i64>())
        .and(warp::path("read"))
        .and(warp::path::end())
        .and(with_authorization(server.auth_service.clone(), USER))
        .and(with(server.message_service.clone()))
        .and_then(handler::mark_message_read);

    let notifications = warp::get()
        .and(warp::path("notifications"))
        .and(warp::path::end())
        .and(warp::query::<PageQuery>())
        .and(with_authorization(server.auth_service.clone(), USER))
        .and(with(server.notification_service.clone()))
        .and_then(handler::list_notifications);

    let notifications_read_all = warp::patch()
        .and(warp::path("notifications"))
        .and(warp::path("read"))
        .and(warp::path::end())
        .and(with_authorization(server.auth_service.clone(), USER))
        .and(with(server.notification_service.clone()))
        .and_then(handler::mark_all_notifications_read);

    let notification_read = warp::patch()
        .and(warp::path("notifications"))
        .and(warp::path::param::<i64>())
        .and(warp::path("read"))
        .and(warp::path::end())
        .and(with_authorization(server.auth_service.clone(), USER))
        .and(with(server.notification_service.clone()))
        .and_then(handler::mark_notification_read);

    let post_create = warp::post()
        .and(warp::path("posts"))
        .and(warp::path::end())
        .and(warp::body::json())
        .and(with_authorization(server.auth_service.clone(), USER))
        .and(with(server.post_service.clone()))
        .and_then(handler::create_post);

    let post_like = warp::post()
        .and(warp::path("posts"))
        .and(warp::path::param::<i64>())
        .and(warp::path("like"))
        .and(warp::path::end())
        .and(with_authorization(server.auth_service.clone(), USER))
        .and(with(server.post_service.clone()))
        .and_then(handler::like_post);

    let post_comment = warp::post()
        .and(warp::path("posts"))
        .and(warp::path::param::<i64>())
        .and(warp::path("comments"))
        .and(warp::path::end())
        .and(warp::body::json())
        .and(with_authorization(server.auth_service.clone(), USER))
        .and(with(server.post_service.clone()))
        .and_then(handler::add_comment);

    let realtime = warp::get()
        .and(warp::path("realtime"))
        .and(warp::path::end())
        .and(with_authorization(server.auth_service.clone(), USER))
        .and(warp::ws())
        .and(with(server.connection_acceptor.clone()))
        .map(
            |context: AuthContext,
             ws: warp::ws::Ws,
             connection_acceptor: Arc<dyn ConnectionAcceptor>| {
                ws.on_upgrade(move |socket| {
                    handler::join_realtime(socket, context, connection_acceptor)
                })
            },
        );

    register
        .or(login)
        .or(refresh)
        .or(profile)
        .or(conversation)
        .or(message_read)
        .or(notifications_read_all)
        .or(notification_read)
        .or(notifications)
        .or(post_create)
        .or(post_like)
        .or(post_comment)
        .or(realtime)
}

fn with<ServiceType>(
    service: Arc<ServiceType>,
) -> impl Filter<Extract = (Arc<ServiceType>,), Error = Infallible> + Clone
where
    ServiceType: Send + Sync + ?Sized,
{
    warp::any().map(move || service.clone())
}
