// @generated manually, mirrors migrations/ in lockstep.

diesel::table! {
    users (id) {
        id -> Integer,
        phone_number -> Text,
        first_name -> Nullable<Text>,
        last_name -> Nullable<Text>,
        is_active -> Bool,
        is_admin -> Bool,
        metadata -> Text,
        created_at -> BigInt,
        updated_at -> BigInt,
    }
}

diesel::table! {
    sessions (id) {
        id -> Integer,
        user_id -> Integer,
        kind -> Text,
        status -> Text,
        connected_at -> Nullable<BigInt>,
        disconnected_at -> Nullable<BigInt>,
        metadata -> Text,
        created_at -> BigInt,
    }
}

diesel::table! {
    messages (id) {
        id -> Integer,
        session_id -> Integer,
        user_id -> Integer,
        sender_jid -> Text,
        recipient_jid -> Text,
        timestamp -> BigInt,
        kind -> Text,
        direction -> Text,
        content -> Nullable<Text>,
        caption -> Nullable<Text>,
        reply_to_id -> Nullable<Integer>,
        media_metadata -> Nullable<Text>,
        delivery_status -> Nullable<Text>,
        external_id -> Nullable<Text>,
    }
}

diesel::table! {
    auth_codes (id) {
        id -> Integer,
        user_id -> Integer,
        code -> Text,
        used -> Bool,
        expires_at -> BigInt,
        created_at -> BigInt,
    }
}

diesel::table! {
    llm_configs (id) {
        id -> Integer,
        user_id -> Integer,
        provider -> Text,
        api_key_encrypted -> Text,
        model_settings -> Text,
        is_active -> Bool,
    }
}

diesel::joinable!(sessions -> users (user_id));
diesel::joinable!(messages -> users (user_id));
diesel::joinable!(messages -> sessions (session_id));
diesel::joinable!(auth_codes -> users (user_id));
diesel::joinable!(llm_configs -> users (user_id));

diesel::allow_tables_to_appear_in_same_query!(
    users,
    sessions,
    messages,
    auth_codes,
    llm_configs,
);
