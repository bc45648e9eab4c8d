//! Built-in acceptance checks for CentOS/RHEL stemcells

use super::builder::{CatalogBuilder, CheckDraft, GroupBuilder};
use crate::checks::skip::SkipCondition;
use crate::core::context::{Iaas, OS_NAME_VAR, OS_VERSION_VAR};
use serde::{Deserialize, Serialize};

/// Deployment-specific expected values used by the built-in checks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogParams {
  pub hostname: String,
  pub grub_superuser: String,
  pub setuid_allowlist: Vec<String>,
  pub partitioner: String,
}

impl Default for CatalogParams {
  fn default() -> Self {
    Self {
      hostname: "bosh-stemcell".to_string(),
      grub_superuser: "vcap".to_string(),
      setuid_allowlist: vec!["/usr/bin/su".to_string(), "/usr/bin/sudo".to_string()],
      partitioner: "parted".to_string(),
    }
  }
}

const KERNEL_PARAMS: [&str; 3] = ["net.ifnames=0", "selinux=0", "plymouth.enable=0"];

/// Declare the CentOS/RHEL catalog into `catalog`
pub fn centos_rhel(params: &CatalogParams, catalog: &mut CatalogBuilder) {
  catalog.group("Linux kernel modules", |g| {
    g.skip_if(
      SkipCondition::new("inapplicable to RHEL 8")
        .when_env(OS_NAME_VAR, "rhel")
        .when_env(OS_VERSION_VAR, "8"),
    );
    g.command("ls -1 /lib/modules | wc -l")
      .equals("1\n")
      .label("should match only 1 kernel dir");
  });

  catalog.group("installed by dev_tools_config", |g| {
    g.file("/var/vcap/bosh/etc/dev_tools_file_list").matches("/usr/bin/gcc");
  });

  catalog.group("installed by image_install_grub", |g| {
    g.file("/etc/fstab")
      .is_file()
      .contains("UUID=")
      .contains("/ ext4 defaults 1 1");

    g.group(
      "mounted file systems: /etc/fstab should mount nfs with nodev, nosuid (stig: V-38652) (stig: V-38654)",
      |g| {
        g.file("/etc/fstab")
          .is_file()
          .not_contains("nfs")
          .refs(["stig: V-38652", "stig: V-38654"]);
      },
    );

    let grub2 = g.file("/boot/grub2/grub.cfg");
    kernel_params(grub2);
    grub2
      .not_matches("xen_blkfront.sda_is_xvda=1")
      .not_matches("single")
      .label("should not allow booting into single user mode")
      .refs(["stig: V-38586"])
      .matches(format!("set superusers={}", params.grub_superuser))
      .refs(["stig: V-38585"])
      .matches(format!("^password_pbkdf2 {} grub.pbkdf2.sha512.*", params.grub_superuser))
      .refs(["stig: V-38585"]);
    grub_permissions(grub2);

    let grub = g.file("/boot/grub/grub.cfg");
    kernel_params(grub);
    grub_permissions(grub);
    grub
      .matches(" audit=1")
      .label("should enable auditing for processes that start prior to the audit daemon")
      .refs(["CIS-8.1.3"]);
  });

  catalog.group("modified by base_file_permissions", |g| {
    g.command("find / -xdev -perm /ug=s -type f")
      .token_set(&params.setuid_allowlist)
      .label("should only include allowlisted setuid and setgid binaries");
    g.file("/etc/ssh/sshd_config")
      .matches("^PermitRootLogin no$")
      .label("should disallow root login");
  });

  catalog.group_tagged("installed by system-network", [Iaas::Warden.exclusion_tag()], |g| {
    g.file("/etc/hostname").is_file().equals(params.hostname.as_str());
  });

  catalog.group_tagged(
    "installed by the system_network stage",
    [Iaas::Warden.exclusion_tag(), Iaas::Azure.exclusion_tag()],
    |g| {
      sysconfig_network(g, params);
      g.file("/etc/NetworkManager/NetworkManager.conf")
        .is_file()
        .matches("plugins=ifcfg-rh")
        .matches("no-auto-default=*");
    },
  );

  catalog.group_tagged(
    "installed by the system_azure_network stage",
    Iaas::Azure.exclusive_tags(),
    |g| {
      sysconfig_network(g, params);
      g.file("/etc/sysconfig/network-scripts/ifcfg-eth0")
        .is_file()
        .matches("DEVICE=eth0")
        .matches("BOOTPROTO=dhcp")
        .matches("ONBOOT=on")
        .matches("TYPE=\"Ethernet\"");
    },
  );

  agent_settings(catalog, params, Iaas::Aws, &[r#""Type": "HTTP""#]);
  agent_settings(catalog, params, Iaas::Google, &[r#""Type": "InstanceMetadata""#]);
  agent_settings(catalog, params, Iaas::Vsphere, &[r#""Type": "CDROM""#]);
  agent_settings(
    catalog,
    params,
    Iaas::Azure,
    &[
      r#""Type": "File""#,
      r#""MetaDataPath": """#,
      r#""UserDataPath": "/var/lib/waagent/CustomData""#,
      r#""SettingsPath": "/var/lib/waagent/CustomData""#,
      r#""UseServerName": true"#,
      r#""UseRegistry": true"#,
    ],
  );
}

fn kernel_params(draft: &mut CheckDraft) {
  for param in KERNEL_PARAMS {
    draft.matches(param);
  }
}

fn grub_permissions(draft: &mut CheckDraft) {
  draft
    .mode(0o600)
    .label("should be of mode 600")
    .refs(["stig: V-38583"])
    .owned_by("root")
    .label("should be owned by root")
    .refs(["stig: V-38579"])
    .grouped_into("root")
    .label("should be grouped into root")
    .refs(["stig: V-38581"]);
}

fn sysconfig_network(g: &mut GroupBuilder, params: &CatalogParams) {
  g.file("/etc/sysconfig/network")
    .is_file()
    .matches("NETWORKING=yes")
    .matches("NETWORKING_IPV6=no")
    .matches(format!("HOSTNAME={}", params.hostname))
    .matches("NOZEROCONF=yes");
}

fn agent_settings(catalog: &mut CatalogBuilder, params: &CatalogParams, iaas: Iaas, expected: &[&str]) {
  let name = format!("agent settings on {}", iaas);
  catalog.group_tagged(&name, iaas.exclusive_tags(), |g| {
    let agent = g.file("/var/vcap/bosh/agent.json");
    agent
      .valid_json()
      .contains(format!(r#""PartitionerType": "{}""#, params.partitioner));
    for pattern in expected {
      agent.matches(*pattern);
    }
  });
}
