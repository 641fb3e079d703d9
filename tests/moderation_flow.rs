//! Edit-gate and allowlist scenarios.

mod common;

use common::*;
use warden_bot::application::errors::BotError;
use warden_bot::domain::entities::{Event, IncomingMessage};

const LOUNGE: i64 = -100;

fn edited(id: i64, chat_id: i64, sender_id: i64, text: &str) -> IncomingMessage {
    text_message(id, group_chat(chat_id), member(sender_id, "Yuki"), text)
}

#[tokio::test]
async fn unauthorized_edit_is_deleted_and_called_out() {
    let bot = test_bot();

    bot.dispatcher
        .dispatch(Event::EditedMessage(edited(10, LOUNGE, 1, "sneaky edit")))
        .await;

    assert_eq!(bot.api.deletions(), vec![(LOUNGE, 10)]);
    let notices = bot.api.sent_texts(LOUNGE);
    assert_eq!(notices.len(), 1);
    assert!(notices[0].contains("Yuki"), "got: {}", notices[0]);
}

#[tokio::test]
async fn authorized_pair_is_exempt() {
    let bot = test_bot();
    bot.db.grant_authorized(1, LOUNGE).unwrap();

    bot.dispatcher
        .dispatch(Event::EditedMessage(edited(10, LOUNGE, 1, "fixing a typo")))
        .await;

    assert!(bot.api.calls().is_empty());
}

#[tokio::test]
async fn authorization_is_scoped_to_one_chat() {
    let bot = test_bot();
    bot.db.grant_authorized(1, LOUNGE).unwrap();

    bot.dispatcher
        .dispatch(Event::EditedMessage(edited(11, -200, 1, "elsewhere")))
        .await;

    assert_eq!(bot.api.deletions(), vec![(-200, 11)]);
}

#[tokio::test]
async fn attachment_only_edits_pass_through() {
    let bot = test_bot();

    let msg = IncomingMessage::new(12, group_chat(LOUNGE), member(1, "Yuki"));
    bot.dispatcher.dispatch(Event::EditedMessage(msg)).await;

    assert!(bot.api.calls().is_empty());
}

#[tokio::test]
async fn caption_edits_are_moderated_too() {
    let bot = test_bot();

    let msg = IncomingMessage::new(13, group_chat(LOUNGE), member(1, "Yuki"))
        .with_caption("new caption");
    bot.dispatcher.dispatch(Event::EditedMessage(msg)).await;

    assert_eq!(bot.api.deletions(), vec![(LOUNGE, 13)]);
}

#[tokio::test]
async fn private_chat_edits_are_never_moderated() {
    let bot = test_bot();

    let msg = text_message(14, private_chat(1), member(1, "Yuki"), "edited");
    bot.dispatcher.dispatch(Event::EditedMessage(msg)).await;

    assert!(bot.api.calls().is_empty());
}

#[tokio::test]
async fn gate_survives_delivery_failures() {
    let bot = test_bot();
    bot.api.fail_chat(LOUNGE);

    // Both the delete and the notice fail; the handler still succeeds.
    bot.moderation
        .on_edit(&edited(15, LOUNGE, 1, "edit"))
        .await
        .expect("best-effort gate never escalates delivery failures");
    assert!(bot.api.calls().is_empty());
}

#[tokio::test]
async fn allowlist_grant_needs_privilege_and_reply() {
    let bot = test_bot();
    let chat = group_chat(LOUNGE);
    let target = member(2, "Rin");
    let reply = reply_ref(LOUNGE, 4, Some(target.clone()));

    // A plain member cannot grant.
    let err = bot
        .moderation
        .grant(&member(1, "Yuki"), &chat, Some(&reply))
        .await
        .unwrap_err();
    assert!(matches!(err, BotError::PermissionDenied));
    assert!(!bot.db.is_authorized(2, LOUNGE).unwrap());

    // The bot owner can.
    bot.moderation
        .grant(&member(OWNER, "Boss"), &chat, Some(&reply))
        .await
        .unwrap();
    assert!(bot.db.is_authorized(2, LOUNGE).unwrap());

    // Without a reply there is no target.
    let err = bot
        .moderation
        .grant(&member(OWNER, "Boss"), &chat, None)
        .await
        .unwrap_err();
    assert!(matches!(err, BotError::TargetUnresolved));
}

#[tokio::test]
async fn chat_admins_and_sudoers_can_manage_the_allowlist() {
    let bot = test_bot();
    let chat = group_chat(LOUNGE);
    let reply = reply_ref(LOUNGE, 4, Some(member(2, "Rin")));

    // Admin of this chat, not of the bot.
    bot.api.make_chat_admin(LOUNGE, 7);
    bot.moderation
        .grant(&member(7, "Admin"), &chat, Some(&reply))
        .await
        .unwrap();
    assert!(bot.db.is_authorized(2, LOUNGE).unwrap());

    // Sudoer revokes it.
    bot.db.add_sudoer(8, Some("mod")).unwrap();
    bot.moderation
        .revoke(&member(8, "Mod"), &chat, Some(&reply))
        .await
        .unwrap();
    assert!(!bot.db.is_authorized(2, LOUNGE).unwrap());
}

#[tokio::test]
async fn grant_and_revoke_are_idempotent() {
    let bot = test_bot();
    let chat = group_chat(LOUNGE);
    let owner = member(OWNER, "Boss");
    let reply = reply_ref(LOUNGE, 4, Some(member(2, "Rin")));

    bot.moderation.grant(&owner, &chat, Some(&reply)).await.unwrap();
    bot.moderation.grant(&owner, &chat, Some(&reply)).await.unwrap();
    assert!(bot.db.is_authorized(2, LOUNGE).unwrap());

    bot.moderation.revoke(&owner, &chat, Some(&reply)).await.unwrap();
    bot.moderation.revoke(&owner, &chat, Some(&reply)).await.unwrap();
    assert!(!bot.db.is_authorized(2, LOUNGE).unwrap());
}

#[tokio::test]
async fn auth_command_routes_through_the_dispatcher() {
    let bot = test_bot();
    let reply = reply_ref(LOUNGE, 4, Some(member(2, "Rin")));

    let msg = text_message(20, group_chat(LOUNGE), member(OWNER, "Boss"), "/auth")
        .with_reply_to(reply);
    bot.dispatcher.dispatch(Event::Message(msg)).await;

    assert!(bot.db.is_authorized(2, LOUNGE).unwrap());
    let replies = bot.api.sent_texts(LOUNGE);
    assert_eq!(replies.len(), 1);
    assert!(replies[0].contains("Rin"));
}
