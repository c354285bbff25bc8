//! `+PRE_INSTALL` script generation for user and group provisioning.

use fpkg_schema::{Group, User};

const PROLOGUE: &str = r#"
if [ -n "$PKG_ROOTDIR" ] && [ "$PKG_ROOTDIR" != "/" ]; then
  PW="/usr/sbin/pw -R $PKG_ROOTDIR"
else
  PW=/usr/sbin/pw
fi
"#;

/// Render the pre-install script creating `groups` then `users` with `pw(8)`.
///
/// Existing accounts are reused, so the script can run any number of times.
/// Returns `None` when there is nothing to provision.
pub fn generate_pre_install(groups: &[Group], users: &[User]) -> Option<String> {
    if groups.is_empty() && users.is_empty() {
        return None;
    }

    let mut script = String::from(PROLOGUE);

    if !groups.is_empty() {
        script.push_str("\necho \"===> Creating groups.\"\n");
        for group in groups {
            script.push_str(&group_block(group));
        }
    }

    if !users.is_empty() {
        script.push_str("\necho \"===> Creating users.\"\n");
        for user in users {
            script.push_str(&user_block(user));
        }
    }

    Some(script)
}

fn group_block(group: &Group) -> String {
    let Group { name, gid } = group;
    format!(
        r#"
if ! $PW groupshow '{name}' >/dev/null 2>&1; then
  echo "Creating group '{name}' with gid {gid}."
  $PW groupadd '{name}' -g {gid}
else
  echo "Using existing group '{name}'."
fi
"#
    )
}

fn user_block(user: &User) -> String {
    let User { name, uid, group } = user;
    format!(
        r#"
if ! $PW usershow '{name}' >/dev/null 2>&1; then
  echo "Creating user '{name}' with uid {uid}."
  $PW useradd '{name}' -u {uid} -g {group} -c '{name}' \
                   -d /nonexistent -s /usr/sbin/nologin
else
  echo "Using existing user '{name}'."
fi
"#
    )
}
