//! Terraform and Ansible artifact rendering.
//!
//! The Terraform file is assembled block by block because the replica count
//! decides how many instance resources it declares. The playbook is a fixed
//! template with `%%name%%` placeholders; everything between `{{ }}` is left
//! for Jinja to expand at playbook run time.

use crate::config::AwsConfig;
use crate::error::{ProvisionError, Result};
use crate::io;
use crate::request::ProvisioningRequest;
use crate::workspace::Workspace;
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

pub const PRIMARY_TAG: &str = "PostgresPrimary";
pub const REPLICA_TAG_PREFIX: &str = "PostgresReplica";

/// Files written by one `generate` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedArtifacts {
    pub dir: PathBuf,
    pub terraform: PathBuf,
    pub playbook: PathBuf,
}

/// Validate `req`, render both artifacts and write them into `ws`,
/// replacing whatever a previous `generate` left there. Any `inventory.ini`
/// is removed, so configure cannot run until the new layout is applied.
pub fn write_artifacts(
    ws: &Workspace,
    req: &ProvisioningRequest,
    aws: &AwsConfig,
) -> Result<RenderedArtifacts> {
    req.validate()?;

    let terraform = render_terraform(req, aws);
    let playbook = render_playbook(req);

    // Hosts from an earlier apply do not belong to the new configuration.
    if io::remove_if_exists(&ws.inventory_file())? {
        info!(workspace = ws.id(), "removed inventory left by a previous apply");
    }

    io::ensure_dir(ws.dir()).map_err(|e| {
        ProvisionError::Render(format!("cannot create {}: {e}", ws.dir().display()))
    })?;

    let artifacts = RenderedArtifacts {
        dir: ws.dir().to_path_buf(),
        terraform: ws.terraform_file(),
        playbook: ws.playbook_file(),
    };
    for (path, body) in [
        (&artifacts.terraform, &terraform),
        (&artifacts.playbook, &playbook),
    ] {
        io::atomic_write(path, body.as_bytes()).map_err(|e| {
            ProvisionError::Render(format!("cannot write {}: {e}", path.display()))
        })?;
    }

    info!(
        workspace = ws.id(),
        replicas = req.num_replicas,
        instance_type = %req.instance_type,
        "rendered terraform configuration and playbook"
    );
    Ok(artifacts)
}

// ---------------------------------------------------------------------------
// Terraform
// ---------------------------------------------------------------------------

/// Quote a value as an HCL string literal.
fn hcl(value: &str) -> String {
    let escaped = value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace("${", "$${")
        .replace("%{", "%%{");
    format!("\"{escaped}\"")
}

fn instance_block(name: &str, tag: &str, req: &ProvisioningRequest, aws: &AwsConfig) -> String {
    format!(
        r#"
resource "aws_instance" "{name}" {{
  ami           = {ami}
  instance_type = {instance_type}
  key_name      = aws_key_pair.postgres_key.key_name

  tags = {{
    Name = {tag}
  }}
}}
"#,
        ami = hcl(&aws.ami),
        instance_type = hcl(&req.instance_type),
        tag = hcl(tag),
    )
}

pub fn replica_resource_name(n: u32) -> String {
    format!("postgres_replica_{n}")
}

pub fn render_terraform(req: &ProvisioningRequest, aws: &AwsConfig) -> String {
    let mut tf = format!(
        r#"terraform {{
  required_providers {{
    aws = {{
      source = "hashicorp/aws"
    }}
  }}
}}

provider "aws" {{
  region = {region}
}}

resource "aws_key_pair" "postgres_key" {{
  key_name   = {key_name}
  public_key = file({public_key_path})
}}
"#,
        region = hcl(&aws.region),
        key_name = hcl(&aws.key_pair_name),
        public_key_path = hcl(&aws.public_key_path),
    );

    tf.push_str(&instance_block("postgres_primary", PRIMARY_TAG, req, aws));
    for n in 1..=req.num_replicas {
        let tag = format!("{REPLICA_TAG_PREFIX}-{n}");
        tf.push_str(&instance_block(&replica_resource_name(n), &tag, req, aws));
    }

    let replica_ips: Vec<String> = (1..=req.num_replicas)
        .map(|n| format!("    aws_instance.{}.public_ip,", replica_resource_name(n)))
        .collect();
    tf.push_str(&format!(
        r#"
output "primary_ip" {{
  value = aws_instance.postgres_primary.public_ip
}}

output "replica_ips" {{
  value = [
{replica_ips}
  ]
}}
"#,
        replica_ips = replica_ips.join("\n"),
    ));
    tf
}

// ---------------------------------------------------------------------------
// Ansible
// ---------------------------------------------------------------------------

fn substitute(template: &str, vars: &[(&str, String)]) -> String {
    let mut out = template.to_string();
    for (key, value) in vars {
        out = out.replace(&format!("%%{key}%%"), value);
    }
    out
}

pub fn render_playbook(req: &ProvisioningRequest) -> String {
    // One WAL sender per replica plus headroom for a base backup in flight.
    let max_wal_senders = req.num_replicas + 2;
    substitute(
        PLAYBOOK_TEMPLATE,
        &[
            ("postgres_version", req.postgres_version.clone()),
            ("max_connections", req.max_connections.to_string()),
            ("shared_buffers", req.shared_buffers.clone()),
            ("max_wal_senders", max_wal_senders.to_string()),
        ],
    )
}

const PLAYBOOK_TEMPLATE: &str = r#"---
- name: Install PostgreSQL
  hosts: all
  become: yes
  vars:
    postgres_version: "%%postgres_version%%"
  tasks:
    - name: Install PostgreSQL and dependencies
      apt:
        name:
          - "postgresql-{{ postgres_version }}"
          - postgresql-contrib
          - python3-psycopg2
        state: present
        update_cache: yes

- name: Configure primary PostgreSQL server for replication
  hosts: primary
  become: yes
  vars:
    postgres_version: "%%postgres_version%%"
    max_connections: %%max_connections%%
    shared_buffers: %%shared_buffers%%
    max_wal_senders: %%max_wal_senders%%
    pg_conf_dir: "/etc/postgresql/{{ postgres_version }}/main"
  tasks:
    - name: Ensure PostgreSQL is started and enabled
      service:
        name: postgresql
        state: started
        enabled: yes

    - name: Apply tuning and replication settings
      lineinfile:
        path: "{{ pg_conf_dir }}/postgresql.conf"
        regexp: "^#?{{ item.key }}\\s*="
        line: "{{ item.key }} = {{ item.value }}"
      loop:
        - { key: max_connections, value: "{{ max_connections }}" }
        - { key: shared_buffers, value: "{{ shared_buffers }}" }
        - { key: listen_addresses, value: "'*'" }
        - { key: wal_level, value: replica }
        - { key: max_wal_senders, value: "{{ max_wal_senders }}" }
      notify: Restart PostgreSQL

    - name: Allow replication connections
      lineinfile:
        path: "{{ pg_conf_dir }}/pg_hba.conf"
        line: "host    replication     replication     0.0.0.0/0               md5"
        state: present
      notify: Restart PostgreSQL

    - name: Create replication user
      become_user: postgres
      postgresql_user:
        name: replication
        password: "{{ replication_password }}"
        role_attr_flags: "LOGIN,REPLICATION"
        state: present

  handlers:
    - name: Restart PostgreSQL
      service:
        name: postgresql
        state: restarted

- name: Configure replica PostgreSQL servers for replication
  hosts: replica
  become: yes
  vars:
    postgres_version: "%%postgres_version%%"
    max_connections: %%max_connections%%
    shared_buffers: %%shared_buffers%%
    max_wal_senders: %%max_wal_senders%%
    pg_conf_dir: "/etc/postgresql/{{ postgres_version }}/main"
    data_dir: "/var/lib/postgresql/{{ postgres_version }}/main"
  tasks:
    - name: Stop PostgreSQL before replacing the data directory
      service:
        name: postgresql
        state: stopped

    - name: Remove existing data directory
      file:
        path: "{{ data_dir }}"
        state: absent

    - name: Take a base backup from the primary
      become_user: postgres
      command: >
        pg_basebackup -h {{ groups['primary'][0] }} -U replication
        -D {{ data_dir }} -P -R -X stream
      environment:
        PGPASSWORD: "{{ replication_password }}"

    - name: Ensure data directory ownership
      file:
        path: "{{ data_dir }}"
        state: directory
        owner: postgres
        group: postgres
        mode: "0700"

    # postgresql.conf lives outside the data directory, so the base backup
    # does not carry it. A standby must not run with lower limits than the
    # primary or it refuses to start.
    - name: Apply tuning and standby settings
      lineinfile:
        path: "{{ pg_conf_dir }}/postgresql.conf"
        regexp: "^#?{{ item.key }}\\s*="
        line: "{{ item.key }} = {{ item.value }}"
      loop:
        - { key: max_connections, value: "{{ max_connections }}" }
        - { key: shared_buffers, value: "{{ shared_buffers }}" }
        - { key: listen_addresses, value: "'*'" }
        - { key: wal_level, value: replica }
        - { key: max_wal_senders, value: "{{ max_wal_senders }}" }
        - { key: hot_standby, value: "on" }

    - name: Start PostgreSQL on the replica
      service:
        name: postgresql
        state: started
"#;
